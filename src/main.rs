use iced::widget::{button, column, container, image, row, scrollable, text, Column};
use iced::{window, Alignment, Element, Length, Size, Subscription, Task, Theme};
use log::{error, info, warn};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod error;
mod imaging;
mod photos;
mod state;
mod ui;

use config::Config;
use imaging::thumbnail::{Thumbnail, ThumbnailCache};
use photos::authorization::{
    self, AccessPrompt, AlertAction, AuthorizationStatus, DialogPrompt, SettingsAlert,
};
use photos::directory;
use photos::loader::{ImageManager, ImageRequest, RequestId, RequestOptions, SharedImageManager};
use photos::observer::{self, LibraryChange};
use photos::PhotoLibrary;
use state::data::{AlbumInfo, Asset, MediaType};
use state::import::{self, MediaImporter};
use state::library::{ImportResult, Library};
use ui::grid::{GridLayout, GridState, GridViewport};
use ui::picker::{AlbumPicker, AlbumRow, PICKER_HEIGHT};

const INITIAL_WINDOW: Size = Size::new(1024.0, 768.0);

/// Height of the bar above the grid
const HEADER_HEIGHT: f32 = 48.0;

/// Everything the app talks to, passed in at startup
struct Services {
    catalog: Arc<dyn MediaImporter>,
    library: Arc<dyn PhotoLibrary>,
    prompt: Arc<dyn AccessPrompt>,
    images: SharedImageManager,
}

/// The album browser: picker + grid for the selected album
struct PhotosScreen {
    albums: Vec<AlbumInfo>,
    picker: AlbumPicker,
    grid: GridState,
}

enum Screen {
    Root,
    Settings,
    Photos(PhotosScreen),
}

/// Main application state
struct AlbumGrid {
    services: Services,
    config: Config,
    screen: Screen,
    /// Shown on top of the current screen when access is missing
    alert: Option<SettingsAlert>,
    /// Status message to display to the user
    status: String,
    window: Size,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked the "Albums" button
    OpenAlbums,
    AuthorizationResolved(bool),
    AlbumsLoaded(Result<Vec<AlbumInfo>, String>),
    /// User clicked the "Import Folder" button
    ImportFolder,
    /// Background import completed with results
    ImportComplete(Result<ImportResult, String>),
    Alert(AlertAction),
    OpenSettings,
    SetLibraryAccess(bool),
    CloseSettings,
    AlbumSelected(AlbumRow),
    AssetsLoaded { album: usize, assets: Vec<Asset> },
    GridScrolled(scrollable::Viewport),
    WindowResized(Size),
    ThumbnailLoaded {
        index: usize,
        request: RequestId,
        image: Option<image::Handle>,
    },
    ToggleFavorite(usize),
    Back,
    LibraryChanged(LibraryChange),
}

impl AlbumGrid {
    /// Create a new instance of the application
    fn new(services: Services, config: Config) -> (Self, Task<Message>) {
        let image_count = services.catalog.asset_count().unwrap_or(0);
        info!("Album Grid initialized with {} assets", image_count);

        let status = format!("Ready. {} items in library.", image_count);

        (
            AlbumGrid {
                services,
                config,
                screen: Screen::Root,
                alert: None,
                status,
                window: INITIAL_WINDOW,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenAlbums => Task::perform(
                authorization::request_authorization(
                    self.services.library.clone(),
                    self.services.prompt.clone(),
                ),
                Message::AuthorizationResolved,
            ),
            Message::AuthorizationResolved(true) => {
                self.status = "Loading albums...".to_string();
                Task::perform(
                    load_albums(self.services.library.clone(), self.config.media_type),
                    Message::AlbumsLoaded,
                )
            }
            Message::AuthorizationResolved(false) => {
                self.alert = Some(SettingsAlert::access_denied());
                Task::none()
            }
            Message::AlbumsLoaded(Ok(albums)) => {
                info!("Loaded {} albums", albums.len());
                self.status = format!("{} albums", albums.len());

                let grid = GridState::new(
                    GridLayout {
                        spacing: self.config.cell_spacing,
                    },
                    self.grid_viewport(0.0),
                    self.config.scale_factor,
                    RequestOptions {
                        delivery: self.config.delivery,
                    },
                );
                let mut screen = PhotosScreen {
                    picker: AlbumPicker::new(&albums),
                    albums,
                    grid,
                };
                let task = select_album(
                    &mut screen,
                    0,
                    self.services.library.clone(),
                    self.config.media_type,
                );
                self.screen = Screen::Photos(screen);
                task
            }
            Message::AlbumsLoaded(Err(e)) => {
                error!("Could not list albums: {}", e);
                self.status = format!("Could not load albums: {}", e);
                Task::none()
            }
            Message::ImportFolder => {
                // Show the native folder picker dialog
                let folder = FileDialog::new()
                    .set_title("Select Folder with Photos and Videos")
                    .pick_folder();

                if let Some(folder_path) = folder {
                    self.status = format!("Importing from {}...", folder_path.display());

                    return Task::perform(
                        import_folder(self.services.catalog.clone(), folder_path),
                        Message::ImportComplete,
                    );
                }

                Task::none()
            }
            Message::ImportComplete(Ok(result)) => {
                self.status = format!(
                    "Import complete! Added {} items, skipped {} duplicates.",
                    result.imported_count, result.skipped_count
                );
                Task::none()
            }
            Message::ImportComplete(Err(e)) => {
                error!("Import failed: {}", e);
                self.status = format!("Import failed: {}", e);
                Task::none()
            }
            Message::Alert(action) => {
                self.alert = None;
                match action {
                    AlertAction::Cancel => Task::none(),
                    AlertAction::OpenSettings => Task::done(Message::OpenSettings),
                }
            }
            Message::OpenSettings => {
                self.leave_photos();
                self.screen = Screen::Settings;
                Task::none()
            }
            Message::SetLibraryAccess(allowed) => {
                let status = if allowed {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
                if let Err(e) = self.services.library.record_authorization(status) {
                    error!("Could not store library access: {}", e);
                    self.status = format!("Could not change access: {}", e);
                }
                Task::none()
            }
            Message::CloseSettings | Message::Back => {
                self.leave_photos();
                self.screen = Screen::Root;
                Task::none()
            }
            Message::AlbumSelected(row) => match &mut self.screen {
                Screen::Photos(screen) => select_album(
                    screen,
                    row.index,
                    self.services.library.clone(),
                    self.config.media_type,
                ),
                _ => Task::none(),
            },
            Message::AssetsLoaded { album, assets } => {
                let Screen::Photos(screen) = &mut self.screen else {
                    return Task::none();
                };
                if !screen.grid.assets_loaded(album, assets) {
                    info!("Dropping assets of album {} (no longer selected)", album);
                    return Task::none();
                }
                image_tasks(screen.grid.refresh(&self.services.images))
            }
            Message::GridScrolled(viewport) => {
                let Screen::Photos(screen) = &mut self.screen else {
                    return Task::none();
                };
                let bounds = viewport.bounds();
                screen.grid.set_viewport(GridViewport {
                    width: bounds.width,
                    height: bounds.height,
                    offset_y: viewport.absolute_offset().y,
                });
                image_tasks(screen.grid.refresh(&self.services.images))
            }
            Message::WindowResized(size) => {
                self.window = size;
                let Screen::Photos(screen) = &mut self.screen else {
                    return Task::none();
                };
                let offset_y = screen.grid.viewport().offset_y;
                let viewport = grid_viewport(size, offset_y);
                screen.grid.set_viewport(viewport);
                image_tasks(screen.grid.refresh(&self.services.images))
            }
            Message::ThumbnailLoaded {
                index,
                request,
                image,
            } => {
                if let Screen::Photos(screen) = &mut self.screen {
                    screen.grid.image_loaded(index, request, image);
                }
                Task::none()
            }
            Message::ToggleFavorite(index) => {
                let Screen::Photos(screen) = &mut self.screen else {
                    return Task::none();
                };
                if let Some((asset_id, favorite)) = screen.grid.toggle_favorite(index) {
                    if let Err(e) = self.services.library.set_favorite(asset_id, favorite) {
                        warn!("Could not update favorite for asset {}: {}", asset_id, e);
                    }
                }
                Task::none()
            }
            Message::LibraryChanged(change) => {
                observer::library_did_change(&change);
                Task::none()
            }
        }
    }

    fn grid_viewport(&self, offset_y: f32) -> GridViewport {
        grid_viewport(self.window, offset_y)
    }

    /// Drop the photos screen, cancelling its pending image requests
    fn leave_photos(&mut self) {
        if let Screen::Photos(screen) = &mut self.screen {
            screen.grid.clear();
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let base = match &self.screen {
            Screen::Root => self.root_view(),
            Screen::Settings => ui::settings::view(self.services.library.authorization_status()),
            Screen::Photos(screen) => photos_view(screen),
        };

        match &self.alert {
            Some(alert) => ui::alert::modal(base, alert),
            None => base,
        }
    }

    fn root_view(&self) -> Element<'_, Message> {
        let content: Column<Message> = column![
            text("Album Grid").size(48),
            button("Albums").on_press(Message::OpenAlbums).padding(10),
            button("Import Folder")
                .on_press(Message::ImportFolder)
                .padding(10)
                .style(button::secondary),
            button("Settings")
                .on_press(Message::OpenSettings)
                .padding(10)
                .style(button::text),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(40)
        .align_x(Alignment::Center);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            Subscription::run_with_id(
                "library-changes",
                observer::changes(self.services.library.clone()),
            )
            .map(Message::LibraryChanged),
            window::resize_events().map(|(_id, size)| Message::WindowResized(size)),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn photos_view(screen: &PhotosScreen) -> Element<'_, Message> {
    let selected = screen.grid.selected_album();
    let title = screen
        .albums
        .get(selected)
        .map(|album| album.name.as_str())
        .unwrap_or_default();

    let header = row![
        button("Back").on_press(Message::Back).style(button::text),
        text(title).size(20),
    ]
    .spacing(10)
    .align_y(Alignment::Center)
    .height(HEADER_HEIGHT);

    column![header, ui::grid::view(&screen.grid), screen.picker.view(selected)].into()
}

/// Grid area for a window of `size`
fn grid_viewport(size: Size, offset_y: f32) -> GridViewport {
    GridViewport {
        width: size.width,
        height: (size.height - HEADER_HEIGHT - PICKER_HEIGHT).max(0.0),
        offset_y,
    }
}

/// Make `album` the active album, scroll back to the top and refetch its
/// members from the library
fn select_album(
    screen: &mut PhotosScreen,
    album: usize,
    library: Arc<dyn PhotoLibrary>,
    media_type: MediaType,
) -> Task<Message> {
    if !screen.grid.select(album, screen.albums.len()) {
        warn!("Album index {} out of range", album);
        return Task::none();
    }

    let fetch = Task::perform(
        load_album_assets(library, screen.albums[album].clone(), media_type),
        move |assets| Message::AssetsLoaded { album, assets },
    );

    Task::batch([
        scrollable::snap_to(ui::grid::scroll_id(), scrollable::RelativeOffset::START),
        fetch,
    ])
}

/// One task per image request, each reporting back to its cell
fn image_tasks(requests: Vec<(usize, ImageRequest)>) -> Task<Message> {
    Task::batch(requests.into_iter().map(|(index, request)| {
        let id = request.id;
        Task::perform(request.image, move |thumbnail| Message::ThumbnailLoaded {
            index,
            request: id,
            image: thumbnail.map(into_handle),
        })
    }))
}

fn into_handle(thumbnail: Thumbnail) -> image::Handle {
    image::Handle::from_rgba(thumbnail.width, thumbnail.height, thumbnail.pixels)
}

/// List albums on the blocking pool
async fn load_albums(
    library: Arc<dyn PhotoLibrary>,
    media_type: MediaType,
) -> Result<Vec<AlbumInfo>, String> {
    tokio::task::spawn_blocking(move || directory::list_albums(library.as_ref(), media_type))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// Current members of `album` on the blocking pool. Falls back to the
/// snapshot taken when the album was listed if the library query fails.
async fn load_album_assets(
    library: Arc<dyn PhotoLibrary>,
    album: AlbumInfo,
    media_type: MediaType,
) -> Vec<Asset> {
    let fallback = album.clone();
    let fetched = tokio::task::spawn_blocking(move || {
        directory::refetch_album(library.as_ref(), &album, media_type)
    })
    .await;

    match fetched {
        Ok(Ok(fresh)) => directory::album_assets(&fresh),
        Ok(Err(e)) => {
            warn!("Could not refetch album {}: {}", fallback.name, e);
            directory::album_assets(&fallback)
        }
        Err(e) => {
            warn!("Album fetch task failed: {}", e);
            directory::album_assets(&fallback)
        }
    }
}

async fn import_folder(
    catalog: Arc<dyn MediaImporter>,
    folder: PathBuf,
) -> Result<ImportResult, String> {
    import::import_folder_async(catalog, folder)
        .await
        .map_err(|e| e.to_string())
}

fn init_logging(config: &Config) {
    let default_filter = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Config::default_path()?;
    let (config, config_error) = match Config::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_logging(&config);
    if let Some(e) = config_error {
        warn!("Ignoring {}: {}", config_path.display(), e);
    }

    // The app cannot function without its catalog
    let catalog = match &config.catalog_path {
        Some(path) => Library::open(path),
        None => Library::new(),
    }
    .map_err(|e| {
        error!("Failed to open the catalog: {}", e);
        e
    })?;
    let catalog = Arc::new(catalog);

    match catalog.verify_files() {
        Ok(0) => {}
        Ok(missing) => info!(
            "{} files in {} are missing",
            missing,
            catalog.path().display()
        ),
        Err(e) => warn!("Could not verify catalogued files: {}", e),
    }

    let cache = match ThumbnailCache::in_user_cache() {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Thumbnail cache disabled: {}", e);
            None
        }
    };

    let services = Services {
        library: catalog.clone(),
        catalog,
        prompt: Arc::new(DialogPrompt),
        images: Arc::new(ImageManager::new(cache)),
    };

    iced::application("Album Grid", AlbumGrid::update, AlbumGrid::view)
        .subscription(AlbumGrid::subscription)
        .theme(AlbumGrid::theme)
        .window_size(INITIAL_WINDOW)
        .centered()
        .run_with(move || AlbumGrid::new(services, config))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photos::fake::{asset, FakeLibrary};
    use crate::state::data::AssetKind;
    use crate::ui::grid::GridPhase;
    use async_trait::async_trait;

    struct Allow;

    #[async_trait]
    impl AccessPrompt for Allow {
        async fn ask(&self) -> AuthorizationStatus {
            AuthorizationStatus::Authorized
        }
    }

    fn sample_library() -> Arc<FakeLibrary> {
        let library = FakeLibrary::with_assets(vec![
            asset(1, AssetKind::Image, 100),
            asset(2, AssetKind::Image, 200),
            asset(3, AssetKind::Image, 300),
            asset(4, AssetKind::Video, 400),
        ]);
        library.add_smart_album("smart/favorites", "Favorites", vec![2]);
        Arc::new(library)
    }

    fn app(library: Arc<FakeLibrary>) -> AlbumGrid {
        let services = Services {
            catalog: library.clone(),
            library,
            prompt: Arc::new(Allow),
            images: Arc::new(ImageManager::new(None)),
        };
        AlbumGrid::new(services, Config::default()).0
    }

    fn photos_screen(app: &AlbumGrid) -> &PhotosScreen {
        match &app.screen {
            Screen::Photos(screen) => screen,
            _ => panic!("not on the photos screen"),
        }
    }

    fn open_photos(app: &mut AlbumGrid, library: &FakeLibrary) {
        let albums = directory::list_albums(library, MediaType::Image).unwrap();
        let _ = app.update(Message::AlbumsLoaded(Ok(albums)));
    }

    #[test]
    fn test_denied_access_alert_cancel() {
        let mut app = app(sample_library());
        let _ = app.update(Message::AuthorizationResolved(false));

        let alert = app.alert.clone().expect("alert shown");
        assert_eq!(alert.actions(), [AlertAction::Cancel, AlertAction::OpenSettings]);

        let _ = app.update(Message::Alert(AlertAction::Cancel));
        assert!(app.alert.is_none());
        assert!(matches!(app.screen, Screen::Root));
    }

    #[test]
    fn test_alert_open_settings_navigates() {
        let mut app = app(sample_library());
        let _ = app.update(Message::AuthorizationResolved(false));
        let _ = app.update(Message::Alert(AlertAction::OpenSettings));
        assert!(app.alert.is_none());

        let _ = app.update(Message::OpenSettings);
        assert!(matches!(app.screen, Screen::Settings));

        let _ = app.update(Message::SetLibraryAccess(true));
        assert_eq!(
            app.services.library.authorization_status(),
            AuthorizationStatus::Authorized
        );
    }

    #[test]
    fn test_album_selection_replaces_working_set() {
        let library = sample_library();
        let mut app = app(library.clone());
        open_photos(&mut app, &library);
        assert_eq!(photos_screen(&app).grid.phase(), GridPhase::Loading { album: 0 });

        let all = directory::album_assets(&photos_screen(&app).albums[0]);
        let _ = app.update(Message::AssetsLoaded { album: 0, assets: all });
        assert_eq!(photos_screen(&app).grid.count(), 3);

        let row = photos_screen(&app).picker.row(1).cloned().unwrap();
        let _ = app.update(Message::AlbumSelected(row));
        assert_eq!(photos_screen(&app).grid.phase(), GridPhase::Loading { album: 1 });
        assert_eq!(photos_screen(&app).grid.count(), 0);

        // A late answer for the previous album is ignored
        let stale = directory::album_assets(&photos_screen(&app).albums[0]);
        let _ = app.update(Message::AssetsLoaded { album: 0, assets: stale });
        assert_eq!(photos_screen(&app).grid.phase(), GridPhase::Loading { album: 1 });

        let favorites = directory::album_assets(&photos_screen(&app).albums[1]);
        let _ = app.update(Message::AssetsLoaded { album: 1, assets: favorites });
        assert_eq!(photos_screen(&app).grid.phase(), GridPhase::Loaded { album: 1 });
        assert_eq!(photos_screen(&app).grid.count(), 1);
        assert_eq!(photos_screen(&app).grid.asset(0).unwrap().id, 2);
    }

    #[test]
    fn test_back_returns_to_root() {
        let library = sample_library();
        let mut app = app(library.clone());
        open_photos(&mut app, &library);
        let _ = app.update(Message::Back);
        assert!(matches!(app.screen, Screen::Root));
    }

    #[tokio::test]
    async fn test_favorite_survives_reselect() {
        let library = sample_library();
        let mut app = app(library.clone());
        open_photos(&mut app, &library);

        let all = directory::album_assets(&photos_screen(&app).albums[0]);
        let _ = app.update(Message::AssetsLoaded { album: 0, assets: all });
        let first = photos_screen(&app).grid.asset(0).unwrap().id;
        let _ = app.update(Message::ToggleFavorite(0));

        // Selecting the album again goes back to the library
        let album = photos_screen(&app).albums[0].clone();
        let reloaded = load_album_assets(library.clone(), album, MediaType::Image).await;
        let toggled = reloaded.iter().find(|a| a.id == first).unwrap();
        assert!(toggled.favorite);
    }
}
