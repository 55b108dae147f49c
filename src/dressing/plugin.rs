//! Dressing plugin wiring (glue).
//! - Manifest asset/loader
//! - WorldSeed + settings + store handle
//! - One-shot generation (first run) or replay (later runs)
//! - Fire-and-forget persistence on the IO pool
//! - Spawn queue drained into meshes

use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task};
use futures_lite::future;
use std::path::PathBuf;
use std::sync::Arc;

use super::core::{ClusterRecord, WorldSeed};
use super::error::DressingError;
use super::grid::{CellRegistration, OccupancyGrid};
use super::placer::PlacementSession;
use super::queue::{SpawnQueue, SpawnQueueConfig, SpawnRequest};
use super::registry::{DressingManifest, DressingManifestAssetPlugin};
use super::render::{drain_primitive_queue, spawn_cluster_groups, ActiveManifest, DressingAssets};
use super::replay::{rebuild_grid, replay};
use super::store::{DressingSnapshot, DressingStore, DressingStoreHandle, RonFileStore, StoreError};

/// Where the manifest and the save live, and how the session is seeded.
#[derive(Resource, Clone, Debug)]
pub struct DressingSettings {
    pub manifest_path: String,
    pub save_path: PathBuf,
    /// Fixed seed; `None` rolls a fresh one each first run.
    pub world_seed: Option<u64>,
    /// Drop the existing save at startup and generate again.
    pub regenerate: bool,
}

impl Default for DressingSettings {
    fn default() -> Self {
        Self {
            manifest_path: "dressing/desert.dressing.ron".to_string(),
            save_path: PathBuf::from("saves/dressing.ron"),
            world_seed: None,
            regenerate: false,
        }
    }
}

impl DressingSettings {
    /// Defaults overridden by `DUNETHREE_SEED`, `DUNETHREE_SAVE`, `DUNETHREE_REGENERATE`.
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Some(seed) = parse_seed(std::env::var("DUNETHREE_SEED").ok().as_deref()) {
            s.world_seed = Some(seed);
        }
        if let Ok(path) = std::env::var("DUNETHREE_SAVE") {
            if !path.trim().is_empty() {
                s.save_path = PathBuf::from(path);
            }
        }
        s.regenerate = parse_flag(std::env::var("DUNETHREE_REGENERATE").ok().as_deref());
        s
    }
}

fn parse_seed(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1") | Some("true") | Some("yes"))
}

/// Handle to the loaded manifest asset.
#[derive(Resource, Default)]
pub struct DressingManifestHandle(pub Handle<DressingManifest>);

/// Live occupancy grid for whoever places things after the dressing.
#[derive(Resource, Clone, Default, Debug)]
pub struct DressingGrid(pub OccupancyGrid);

/// A save hand-off failed, or a generated layout was left unsaved.
#[derive(Event, Clone, Debug)]
pub struct DressingPersistFailed {
    pub what: String,
    pub error: String,
}

/// Fired once when the scene dressing has been queued.
#[derive(Event, Clone, Copy, Debug)]
pub struct DressingBuilt {
    pub generated: bool,
    pub cells: usize,
}

/// In-flight save tasks, labelled for logging.
#[derive(Resource, Default)]
pub struct PersistenceTasks {
    tasks: Vec<(String, Task<Result<(), StoreError>>)>,
}

impl PersistenceTasks {
    pub fn len(&self) -> usize { self.tasks.len() }
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}

pub struct DressingPlugin;
impl Plugin for DressingPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DressingManifestAssetPlugin)
            .init_resource::<DressingSettings>()
            .init_resource::<DressingManifestHandle>()
            .init_resource::<DressingGrid>()
            .init_resource::<SpawnQueue>()
            .init_resource::<SpawnQueueConfig>()
            .init_resource::<DressingAssets>()
            .init_resource::<PersistenceTasks>()
            .add_event::<CellRegistration>()
            .add_event::<DressingPersistFailed>()
            .add_event::<DressingBuilt>()
            .add_systems(Startup, (init_world_seed_from_settings, open_store, load_manifest))
            .add_systems(
                Update,
                (
                    build_dressing,
                    drain_primitive_queue.after(build_dressing),
                    poll_persistence_tasks,
                ),
            );
    }
}

/// Startup: insert WorldSeed based on DressingSettings.
fn init_world_seed_from_settings(mut commands: Commands, settings: Res<DressingSettings>) {
    let seed = settings.world_seed.unwrap_or_else(rand::random);
    commands.insert_resource(WorldSeed(seed));
    info!("Dressing: world_seed={}", seed);
}

/// Startup: open the save, dropping it first when asked to regenerate.
fn open_store(mut commands: Commands, settings: Res<DressingSettings>) {
    let store = RonFileStore::new(settings.save_path.clone());
    if settings.regenerate {
        match store.reset() {
            Ok(()) => info!("Dressing: cleared save {:?}, regenerating", store.path()),
            Err(e) => error!("Dressing: failed to clear save {:?}: {}", store.path(), e),
        }
    }
    info!("Dressing: save file {:?}", store.path());
    commands.insert_resource(DressingStoreHandle(Arc::new(store)));
}

/// Startup: request loading the manifest, store handle.
fn load_manifest(
    mut handle_res: ResMut<DressingManifestHandle>,
    settings: Res<DressingSettings>,
    assets: Res<AssetServer>,
) {
    if handle_res.0.is_strong() { return; }
    handle_res.0 = assets.load(settings.manifest_path.as_str());
    info!("Dressing: loading manifest from '{}'", settings.manifest_path);
}

/// Records and grid updates of one finished feature pass.
#[derive(Debug)]
pub struct FeaturePass {
    pub name: String,
    pub records: Vec<ClusterRecord>,
    pub registrations: Vec<CellRegistration>,
}

/// Run every feature of `manifest` in order over one session.
/// `on_pass` sees each pass as soon as its grid work is done; failed
/// passes are logged, rolled back and returned.
pub fn run_generation(
    manifest: &DressingManifest,
    seed: WorldSeed,
    mut on_pass: impl FnMut(FeaturePass),
) -> (OccupancyGrid, Vec<DressingError>) {
    let plates = manifest.start_plates();
    let mut session = PlacementSession::from_seed(seed);
    let mut failures = Vec::new();

    for def in &manifest.features {
        match session.place_clusters(def, &plates) {
            Ok(records) => {
                let registrations = session.drain_registrations();
                info!(
                    "Dressing: generated {} '{}' clusters, {} cells",
                    records.len(),
                    def.name,
                    registrations.len()
                );
                on_pass(FeaturePass { name: def.name.clone(), records, registrations });
            }
            Err(e) => {
                error!("Dressing: {}", e);
                failures.push(e);
            }
        }
    }

    (session.into_grid(), failures)
}

/// Spawn a save on the IO pool; the caller never waits on it.
pub fn hand_off<F>(tasks: &mut PersistenceTasks, what: impl Into<String>, store: Arc<dyn DressingStore>, job: F)
where
    F: FnOnce(&dyn DressingStore) -> Result<(), StoreError> + Send + 'static,
{
    let task = IoTaskPool::get().spawn(async move { job(store.as_ref()) });
    tasks.tasks.push((what.into(), task));
}

/// Queue every record of one feature under fresh cluster groups.
fn queue_feature(commands: &mut Commands, queue: &mut SpawnQueue, feature: &str, records: &[ClusterRecord]) -> usize {
    let groups = spawn_cluster_groups(commands, feature, records.len());
    let prims = replay(records);
    let n = prims.len();
    queue.items.extend(prims.into_iter().map(|p| SpawnRequest { parent: groups[p.cluster], primitive: p }));
    n
}

/// Update: once the manifest is ready, generate (first run) or replay the save.
fn build_dressing(
    mut commands: Commands,
    mut built: Local<bool>,
    handle: Res<DressingManifestHandle>,
    manifests: Res<Assets<DressingManifest>>,
    asset_server: Res<AssetServer>,
    seed: Res<WorldSeed>,
    store: Res<DressingStoreHandle>,
    mut queue: ResMut<SpawnQueue>,
    mut tasks: ResMut<PersistenceTasks>,
    mut registered: EventWriter<CellRegistration>,
    mut failed: EventWriter<DressingPersistFailed>,
    mut done: EventWriter<DressingBuilt>,
) {
    if *built { return; }

    let manifest = match manifests.get(&handle.0) {
        Some(m) => m.clone(),
        None => {
            if !matches!(asset_server.load_state(handle.0.id()), LoadState::Failed(_)) {
                return;
            }
            warn!("Dressing: manifest failed to load; using the built-in desert manifest");
            match DressingManifest::builtin() {
                Ok(m) => m,
                Err(e) => {
                    error!("Dressing: built-in manifest is broken: {}", e);
                    *built = true;
                    return;
                }
            }
        }
    };
    *built = true;

    let snapshot = match store.0.load() {
        Ok(s) => s,
        Err(e) => {
            warn!("Dressing: could not read save ({}); generating a new layout", e);
            failed.write(DressingPersistFailed { what: "load".to_string(), error: e.to_string() });
            DressingSnapshot::default()
        }
    };

    let generated = snapshot.is_start();
    let mut cells = 0usize;

    let grid = if generated {
        let mut passes = Vec::new();
        let (grid, failures) = run_generation(&manifest, *seed, |pass| {
            registered.write_batch(pass.registrations);
            cells += queue_feature(&mut commands, &mut queue, &pass.name, &pass.records);
            passes.push((pass.name, pass.records));
        });

        if failures.is_empty() {
            for (name, records) in passes {
                hand_off(&mut tasks, format!("objects '{name}'"), store.0.clone(), move |s| {
                    s.save_objects(&name, &records)
                });
            }
            let snapshot_grid = grid.clone();
            hand_off(&mut tasks, "grid", store.0.clone(), move |s| s.save_grid(&snapshot_grid));
        } else {
            // a partial layout is never saved; the next launch generates again
            warn!("Dressing: {} feature pass(es) failed; layout not saved", failures.len());
            failed.write_batch(failures.iter().map(|e| DressingPersistFailed {
                what: "generation".to_string(),
                error: e.to_string(),
            }));
        }
        grid
    } else {
        for name in manifest.feature_names() {
            match snapshot.objects.get(name) {
                Some(records) => {
                    let n = queue_feature(&mut commands, &mut queue, name, records);
                    info!("Dressing: replaying {} '{}' clusters, {} cells", records.len(), name, n);
                    cells += n;
                }
                None => warn!("Dressing: save has no '{}' records; nothing to replay", name),
            }
        }
        for name in snapshot.objects.keys().filter(|k| manifest.get(k).is_none()) {
            warn!("Dressing: save has '{}' records but the manifest does not define it", name);
        }
        if snapshot.grid.is_empty() { rebuild_grid(&snapshot) } else { snapshot.grid }
    };

    commands.insert_resource(DressingGrid(grid));
    commands.insert_resource(ActiveManifest(manifest));
    done.write(DressingBuilt { generated, cells });
}

/// Update: collect finished saves; failures are logged and re-emitted as events.
fn poll_persistence_tasks(mut tasks: ResMut<PersistenceTasks>, mut failed: EventWriter<DressingPersistFailed>) {
    tasks.tasks.retain_mut(|(what, task)| {
        if !task.is_finished() {
            return true; // keep unfinished task
        }
        match future::block_on(future::poll_once(task)) {
            Some(Ok(())) => debug!("Dressing: saved {}", what),
            Some(Err(e)) => {
                error!("Dressing: persistence failed for {}: {}", what, e);
                failed.write(DressingPersistFailed { what: what.clone(), error: e.to_string() });
            }
            None => return true,
        }
        false // remove finished task
    });
}
