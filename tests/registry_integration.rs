use delta::error::DeltaError;
use delta::models::ModelRegistry;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn registry_round_trips_across_instances() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("models.json");

    {
        let mut registry = ModelRegistry::load(&store).unwrap();
        registry
            .register("llama3", "/home/user/.delta/models/llama3.gguf")
            .unwrap();
    }

    // A fresh instance, as a new process invocation would see it
    let registry = ModelRegistry::load(&store).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.resolve("llama3").unwrap(),
        PathBuf::from("/home/user/.delta/models/llama3.gguf")
    );
    assert!(matches!(
        registry.resolve("mistral"),
        Err(DeltaError::NotFound(_))
    ));
}

#[test]
fn first_registration_wins_across_instances() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("models.json");

    {
        let mut registry = ModelRegistry::load(&store).unwrap();
        registry.register("llama3", "/models/first.gguf").unwrap();
    }

    let mut registry = ModelRegistry::load(&store).unwrap();
    let resolved = registry.register("llama3", "/models/second.gguf").unwrap();
    assert_eq!(resolved, PathBuf::from("/models/first.gguf"));
}

#[test]
fn corrupt_store_fails_loudly_and_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("models.json");
    fs::write(&store, "]]garbage[[").unwrap();

    let result = ModelRegistry::load(&store);
    assert!(matches!(result, Err(DeltaError::StoreCorrupt { .. })));

    // The broken file is left untouched for the user to inspect
    assert_eq!(fs::read_to_string(&store).unwrap(), "]]garbage[[");
}

#[test]
fn store_survives_partial_tmp_leftover() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("models.json");

    // A stale tmp file from an interrupted save must not shadow the store
    fs::write(dir.path().join("models.tmp"), "{\"half\":").unwrap();

    let mut registry = ModelRegistry::load(&store).unwrap();
    registry.register("llama3", "/models/llama3.gguf").unwrap();

    let reloaded = ModelRegistry::load(&store).unwrap();
    assert_eq!(
        reloaded.resolve("llama3").unwrap(),
        PathBuf::from("/models/llama3.gguf")
    );
}
