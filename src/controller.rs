//! Game list screen logic: snapshots in, gestures in, commands out
use crate::interaction::{PropertiesAction, RowInteractions, UiCommand};
use crate::reconciler::ListReconciler;
use crate::surface::PresentationSurface;
use crate::types::GameRecord;
use std::sync::Arc;
use std::time::Instant;

/// Produces a fresh snapshot of the game library, e.g. by rescanning the ROM folder.
pub trait LibrarySource: Send + Sync {
    fn fetch(&self) -> Vec<GameRecord>;
}

impl<F> LibrarySource for F
where
    F: Fn() -> Vec<GameRecord> + Send + Sync,
{
    fn fetch(&self) -> Vec<GameRecord> {
        self()
    }
}

pub struct GameListController<S: PresentationSurface<GameRecord>> {
    list: ListReconciler<GameRecord, S>,
    interactions: RowInteractions,
    library: Arc<dyn LibrarySource>,
}

impl<S: PresentationSurface<GameRecord>> GameListController<S> {
    pub fn new(
        list: ListReconciler<GameRecord, S>,
        interactions: RowInteractions,
        library: Arc<dyn LibrarySource>,
    ) -> Self {
        GameListController {
            list,
            interactions,
            library,
        }
    }

    /// Fetches a snapshot and submits it. Returns the submission's generation.
    pub fn refresh(&mut self) -> u64 {
        let snapshot = self.library.fetch();
        log::info!("GameListController: library snapshot with {} titles", snapshot.len());
        self.list.submit(snapshot)
    }

    pub fn tap(&mut self, position: usize, now: Instant) -> Vec<UiCommand> {
        let Some(record) = self.row(position) else {
            return Vec::new();
        };
        let commands = self.interactions.on_tap(&record, now);
        self.run_refreshes(commands)
    }

    pub fn long_press(&mut self, position: usize) -> Vec<UiCommand> {
        let Some(record) = self.row(position) else {
            return Vec::new();
        };
        let commands = self.interactions.on_long_press(&record);
        self.run_refreshes(commands)
    }

    pub fn properties_action(&mut self, position: usize, action: PropertiesAction) -> Vec<UiCommand> {
        match self.row(position) {
            Some(record) => self.interactions.properties_action(&record, action),
            None => Vec::new(),
        }
    }

    pub fn list(&self) -> &ListReconciler<GameRecord, S> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListReconciler<GameRecord, S> {
        &mut self.list
    }

    /// Gestures address rows of the committed baseline only.
    fn row(&self, position: usize) -> Option<GameRecord> {
        let record = self.list.record_at(position).cloned();
        if record.is_none() {
            log::debug!(
                "GameListController: no row {} (list has {})",
                position,
                self.list.current_count()
            );
        }
        record
    }

    /// Handles `RefreshLibrary` here and passes everything else on.
    fn run_refreshes(&mut self, commands: Vec<UiCommand>) -> Vec<UiCommand> {
        let (refreshes, rest): (Vec<_>, Vec<_>) = commands
            .into_iter()
            .partition(|c| matches!(c, UiCommand::RefreshLibrary));
        if !refreshes.is_empty() {
            self.refresh();
        }
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{Notice, StorageProbe};
    use crate::surface::VecSurface;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeDisk {
        files: Mutex<HashSet<String>>,
        titles: Mutex<Vec<GameRecord>>,
    }

    impl FakeDisk {
        fn add(&self, record: GameRecord) {
            self.files.lock().unwrap().insert(record.locator.clone());
            self.titles.lock().unwrap().push(record);
        }

        fn delete(&self, locator: &str) {
            self.files.lock().unwrap().remove(locator);
            self.titles.lock().unwrap().retain(|g| g.locator != locator);
        }
    }

    impl StorageProbe for FakeDisk {
        fn exists(&self, locator: &str) -> bool {
            self.files.lock().unwrap().contains(locator)
        }
    }

    impl LibrarySource for FakeDisk {
        fn fetch(&self) -> Vec<GameRecord> {
            self.titles.lock().unwrap().clone()
        }
    }

    fn controller(disk: &Arc<FakeDisk>) -> GameListController<VecSurface<GameRecord>> {
        let list = ListReconciler::spawn(VecSurface::new()).unwrap();
        GameListController::new(list, RowInteractions::new(disk.clone()), disk.clone())
    }

    fn seeded_disk() -> Arc<FakeDisk> {
        let disk = Arc::new(FakeDisk::default());
        disk.add(GameRecord::new(0x10, "Alpha", "/roms/alpha.3ds"));
        disk.add(GameRecord::new(0x20, "Beta", "/roms/beta.cci"));
        disk.add(GameRecord::new(0x30, "Gamma", "/roms/gamma.cia"));
        disk
    }

    #[tokio::test]
    async fn refresh_populates_list() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        screen.refresh();
        screen.list_mut().settle().await.unwrap();
        assert_eq!(screen.list().current_count(), 3);
        assert_eq!(screen.list().surface().rows(), disk.fetch().as_slice());
    }

    #[tokio::test]
    async fn tap_on_deleted_file_resubmits_library() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        screen.refresh();
        screen.list_mut().settle().await.unwrap();

        disk.delete("/roms/beta.cci");
        let before = screen.list().latest_generation();
        let commands = screen.tap(1, Instant::now());

        assert_eq!(commands, vec![UiCommand::ShowNotice { notice: Notice::FileNotFound }]);
        assert_eq!(screen.list().latest_generation(), before + 1);

        screen.list_mut().settle().await.unwrap();
        let titles: Vec<&str> = screen.list().surface().rows().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "Gamma"]);
    }

    #[tokio::test]
    async fn tap_on_live_file_launches_and_debounces() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        screen.refresh();
        screen.list_mut().settle().await.unwrap();

        let t0 = Instant::now();
        let commands = screen.tap(2, t0);
        assert!(matches!(
            commands.last(),
            Some(UiCommand::Launch { record, custom_settings: false }) if record.title == "Gamma"
        ));
        assert!(screen.tap(0, t0 + Duration::from_millis(10)).is_empty());
        assert!(!screen.tap(0, t0 + Duration::from_millis(1000)).is_empty());
    }

    #[tokio::test]
    async fn long_press_on_deleted_file_resubmits_library() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        screen.refresh();
        screen.list_mut().settle().await.unwrap();

        disk.delete("/roms/alpha.3ds");
        let commands = screen.long_press(0);
        assert_eq!(commands, vec![UiCommand::ShowNotice { notice: Notice::FileNotFound }]);
        assert!(!screen.list().is_settled());
    }

    #[tokio::test]
    async fn gestures_outside_the_list_do_nothing() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        assert!(screen.tap(0, Instant::now()).is_empty());
        assert!(screen.long_press(5).is_empty());
        assert!(screen.properties_action(0, PropertiesAction::OpenCheats).is_empty());
    }

    #[tokio::test]
    async fn properties_actions_use_committed_rows() {
        let disk = seeded_disk();
        let mut screen = controller(&disk);
        screen.refresh();
        screen.list_mut().settle().await.unwrap();
        assert_eq!(
            screen.properties_action(1, PropertiesAction::OpenSettings),
            vec![UiCommand::OpenSettings { scope: "0000000000000020".to_string() }]
        );
    }
}
