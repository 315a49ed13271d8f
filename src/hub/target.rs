//! Build target resolution
//!
//! Targets are resolved fresh from the hub for every submission. A missing
//! target, a missing destination tag, and a locked destination tag (unless
//! the build is scratch) all abort the submission. Chain builds additionally
//! require the build tag to inherit from the destination tag, since the
//! intermediate builds must become available to the later links.

use super::{BuildHub, BuildTarget, HubError, TagInfo};

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Unknown build target: {0}")]
    UnknownTarget(String),

    #[error("Build target {target} has unknown destination tag {tag}")]
    UnknownDestTag { target: String, tag: String },

    #[error("Destination tag {0} is locked")]
    LockedTag(String),

    #[error("Destination tag {dest} is not inherited by build tag {build}")]
    NotInherited { dest: String, build: String },

    #[error(transparent)]
    Hub(#[from] HubError),
}

#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub target: BuildTarget,
    pub dest: TagInfo,
}

pub fn resolve_target(
    hub: &dyn BuildHub,
    name: &str,
    scratch: bool,
    chained: bool,
) -> Result<ResolvedTarget, TargetError> {
    let target = hub
        .build_target(name)?
        .ok_or_else(|| TargetError::UnknownTarget(name.to_string()))?;

    let dest = hub
        .tag_by_name(&target.dest_tag_name)?
        .ok_or_else(|| TargetError::UnknownDestTag {
            target: target.name.clone(),
            tag: target.dest_tag_name.clone(),
        })?;

    // Scratch builds never tag, so a locked destination does not block them.
    if dest.locked && !scratch {
        return Err(TargetError::LockedTag(dest.name));
    }

    if chained {
        let ancestors = hub.full_inheritance(target.build_tag)?;
        let inherited = target.build_tag == dest.id
            || ancestors.iter().any(|entry| entry.parent_id == dest.id);
        if !inherited {
            return Err(TargetError::NotInherited {
                dest: dest.name,
                build: target.build_tag_name,
            });
        }
    }

    Ok(ResolvedTarget { target, dest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::mock::MockHub;
    use crate::hub::InheritanceEntry;

    #[test]
    fn test_unknown_target() {
        let hub = MockHub::new("https://hub.test/web");
        let err = resolve_target(&hub, "no-such", false, false).unwrap_err();
        assert!(matches!(err, TargetError::UnknownTarget(_)));
    }

    #[test]
    fn test_unknown_dest_tag() {
        let hub = MockHub::new("https://hub.test/web");
        hub.add_target(BuildTarget {
            name: "dist-candidate".to_string(),
            build_tag: 10,
            build_tag_name: "dist-build".to_string(),
            dest_tag: 20,
            dest_tag_name: "dist-pending".to_string(),
        });
        let err = resolve_target(&hub, "dist-candidate", false, false).unwrap_err();
        assert!(matches!(err, TargetError::UnknownDestTag { .. }));
    }

    #[test]
    fn test_locked_tag_blocks_unless_scratch() {
        let hub = MockHub::primed("https://hub.test/web", "dist-candidate");
        hub.add_tag(TagInfo {
            id: 20,
            name: "dist-candidate-pending".to_string(),
            locked: true,
        });

        let err = resolve_target(&hub, "dist-candidate", false, false).unwrap_err();
        assert!(matches!(err, TargetError::LockedTag(_)));

        resolve_target(&hub, "dist-candidate", true, false).unwrap();
    }

    #[test]
    fn test_chain_requires_inheritance() {
        let hub = MockHub::primed("https://hub.test/web", "dist-candidate");
        hub.add_inheritance(
            10,
            vec![InheritanceEntry {
                parent_id: 99,
                name: "unrelated".to_string(),
            }],
        );

        let err = resolve_target(&hub, "dist-candidate", false, true).unwrap_err();
        assert!(matches!(err, TargetError::NotInherited { .. }));

        // A plain build does not consult the inheritance chain.
        resolve_target(&hub, "dist-candidate", false, false).unwrap();
    }

    #[test]
    fn test_primed_hub_resolves() {
        let hub = MockHub::primed("https://hub.test/web", "dist-candidate");
        let resolved = resolve_target(&hub, "dist-candidate", false, true).unwrap();
        assert_eq!(resolved.target.name, "dist-candidate");
        assert_eq!(resolved.dest.name, "dist-candidate-pending");
    }
}
