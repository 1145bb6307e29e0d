//! Image resolution.
//!
//! The engine reports running containers by image content ID, while specs
//! name images by tag. These helpers translate between the two and pull
//! images that are not present locally.

use berth_common::types::{ContainerId, ImageId};
use berth_engine::ContainerEngine;
use berth_engine::EngineError;
use berth_engine::model::{AuthConfig, ContainerConfig};

use crate::error::{ReconcileError, Result};

/// Returns the content ID of `image`, pulling it first if no local image
/// carries that tag.
///
/// The catalog is listed at most twice: once before and once after the pull.
///
/// # Errors
///
/// Returns an engine error if listing or pulling fails, or
/// `ImageNotIdentified` if the tag is still unknown after the pull.
pub fn resolve_image_id<E>(engine: &E, image: &str, auth: Option<&AuthConfig>) -> Result<ImageId>
where
    E: ContainerEngine + ?Sized,
{
    if let Some(id) = find_local(engine, image)? {
        tracing::debug!(image, id = %id, "image resolved from local catalog");
        return Ok(id);
    }

    tracing::info!(image, "image not present locally, pulling");
    engine
        .pull_image(image, auth)
        .map_err(|e| ReconcileError::engine("pull", image, e))?;

    find_local(engine, image)?.ok_or_else(|| ReconcileError::ImageNotIdentified {
        image: image.to_string(),
    })
}

fn find_local<E>(engine: &E, image: &str) -> Result<Option<ImageId>>
where
    E: ContainerEngine + ?Sized,
{
    let images = engine
        .list_images()
        .map_err(|e| ReconcileError::engine("list images", image, e))?;
    Ok(images.into_iter().find(|i| i.has_tag(image)).map(|i| i.id))
}

/// Creates a container, pulling its image and retrying once if the engine
/// does not know the image.
///
/// # Errors
///
/// Returns an engine error if the first create fails for any reason other
/// than a missing image, if the pull fails, or if the retry fails.
pub fn create_with_pull<E>(
    engine: &E,
    config: &ContainerConfig,
    name: &str,
    auth: Option<&AuthConfig>,
) -> Result<ContainerId>
where
    E: ContainerEngine + ?Sized,
{
    match engine.create_container(config, name) {
        Ok(id) => return Ok(id),
        Err(EngineError::NotFound { .. }) => {
            tracing::info!(name, image = %config.image, "image missing on create, pulling");
        }
        Err(e) => return Err(ReconcileError::engine("create", name, e)),
    }

    engine
        .pull_image(&config.image, auth)
        .map_err(|e| ReconcileError::engine("pull", &config.image, e))?;

    engine
        .create_container(config, name)
        .map_err(|e| ReconcileError::engine("create", name, e))
}

#[cfg(test)]
mod tests {
    use berth_engine::model::ImageRecord;

    use super::*;
    use crate::testing::{Call, ScriptedEngine};

    fn record(tag: &str, id: &str) -> ImageRecord {
        ImageRecord {
            id: ImageId::new(id),
            repo_tags: vec![tag.to_string()],
        }
    }

    #[test]
    fn resolves_without_pull_when_tagged_locally() {
        let engine = ScriptedEngine::new().on_list_images(|_| Ok(vec![record("redis:7", "sha256:r")]));
        let id = resolve_image_id(&engine, "redis:7", None).expect("resolve");
        assert_eq!(id, ImageId::new("sha256:r"));
        assert_eq!(engine.calls(), vec![Call::ListImages]);
    }

    #[test]
    fn pulls_and_relists_when_missing() {
        let engine = ScriptedEngine::new().on_list_images(|n| {
            if n == 1 {
                Ok(Vec::new())
            } else {
                Ok(vec![record("redis:7", "sha256:r")])
            }
        });
        let id = resolve_image_id(&engine, "redis:7", None).expect("resolve");
        assert_eq!(id, ImageId::new("sha256:r"));
        assert_eq!(
            engine.calls(),
            vec![Call::ListImages, Call::Pull("redis:7".into()), Call::ListImages]
        );
    }

    #[test]
    fn unidentified_after_pull_is_hard_failure() {
        let engine = ScriptedEngine::new().on_list_images(|_| Ok(vec![record("other", "sha256:o")]));
        let err = resolve_image_id(&engine, "redis:7", None).unwrap_err();
        assert!(matches!(err, ReconcileError::ImageNotIdentified { ref image } if image == "redis:7"));
        assert_eq!(engine.calls().len(), 3);
    }

    #[test]
    fn pull_failure_is_wrapped() {
        let engine = ScriptedEngine::new()
            .on_list_images(|_| Ok(Vec::new()))
            .on_pull(|_| Err(EngineError::rejected("pull", "unauthorized")));
        let err = resolve_image_id(&engine, "private/app:1", None).unwrap_err();
        assert!(matches!(err, ReconcileError::Engine { operation: "pull", .. }));
    }

    #[test]
    fn list_failure_is_wrapped() {
        let engine = ScriptedEngine::new().on_list_images(|_| Err(EngineError::rejected("list", "down")));
        let err = resolve_image_id(&engine, "redis:7", None).unwrap_err();
        assert_eq!(err.engine_error(), Some(&EngineError::rejected("list", "down")));
    }

    #[test]
    fn create_with_pull_retries_once_after_not_found() {
        let engine = ScriptedEngine::new().on_create(|n| {
            if n == 1 {
                Err(EngineError::image_not_found("redis:7"))
            } else {
                Ok(ContainerId::new("c1"))
            }
        });
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let id = create_with_pull(&engine, &config, "cache", None).expect("create");
        assert_eq!(id, ContainerId::new("c1"));
        assert_eq!(
            engine.calls(),
            vec![
                Call::Create("cache".into()),
                Call::Pull("redis:7".into()),
                Call::Create("cache".into()),
            ]
        );
    }

    #[test]
    fn create_with_pull_does_not_pull_on_other_errors() {
        let engine = ScriptedEngine::new()
            .on_create(|_| Err(EngineError::Conflict { name: "cache".into() }));
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let err = create_with_pull(&engine, &config, "cache", None).unwrap_err();
        assert!(matches!(err, ReconcileError::Engine { operation: "create", .. }));
        assert_eq!(engine.calls(), vec![Call::Create("cache".into())]);
    }

    #[test]
    fn create_with_pull_surfaces_second_failure() {
        let engine = ScriptedEngine::new().on_create(|_| Err(EngineError::image_not_found("redis:7")));
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let err = create_with_pull(&engine, &config, "cache", None).unwrap_err();
        assert!(err.engine_error().is_some_and(EngineError::is_not_found));
        assert_eq!(engine.calls().len(), 3);
    }
}
