use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use super::data::{Asset, AssetFetch, AssetKind, MediaType, SmartAlbum, RAW_EXTENSIONS};
use crate::error::{Error, Result};
use crate::photos::authorization::AuthorizationStatus;
use crate::photos::observer::{ChangeKind, LibraryChange};
use crate::photos::PhotoLibrary;

/// Assets imported within this many days belong to "Recently Added"
const RECENTLY_ADDED_DAYS: i64 = 30;

const ACCESS_KEY: &str = "library_access";

const ASSET_COLUMNS: &str = "id, path, filename, media_type, created_at, modified_at, favorite";

/// A media file found on disk, ready to be added to the catalog
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub kind: AssetKind,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Result of a folder import operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
}

/// Smart albums computed by the catalog, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmartKind {
    Favorites,
    RecentlyAdded,
    Videos,
    Screenshots,
    Raw,
}

impl SmartKind {
    const ALL: [SmartKind; 5] = [
        SmartKind::Favorites,
        SmartKind::RecentlyAdded,
        SmartKind::Videos,
        SmartKind::Screenshots,
        SmartKind::Raw,
    ];

    fn id(self) -> &'static str {
        match self {
            SmartKind::Favorites => "smart/favorites",
            SmartKind::RecentlyAdded => "smart/recently-added",
            SmartKind::Videos => "smart/videos",
            SmartKind::Screenshots => "smart/screenshots",
            SmartKind::Raw => "smart/raw",
        }
    }

    fn title(self) -> &'static str {
        match self {
            SmartKind::Favorites => "Favorites",
            SmartKind::RecentlyAdded => "Recently Added",
            SmartKind::Videos => "Videos",
            SmartKind::Screenshots => "Screenshots",
            SmartKind::Raw => "RAW",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// SQL condition selecting the members of this album
    fn sql_condition(self, now: DateTime<Utc>) -> String {
        match self {
            SmartKind::Favorites => "favorite = 1".to_string(),
            SmartKind::RecentlyAdded => {
                let cutoff = (now - Duration::days(RECENTLY_ADDED_DAYS)).timestamp();
                format!("imported_at >= {}", cutoff)
            }
            SmartKind::Videos => "media_type = 'video'".to_string(),
            SmartKind::Screenshots => "lower(filename) LIKE '%screenshot%'".to_string(),
            SmartKind::Raw => {
                let clauses: Vec<String> = RAW_EXTENSIONS
                    .iter()
                    .map(|ext| format!("lower(filename) LIKE '%.{}'", ext))
                    .collect();
                format!("({})", clauses.join(" OR "))
            }
        }
    }
}

/// The Library manages the SQLite catalog database.
/// It stores one row per media file plus a few key/value settings,
/// and broadcasts a change token on every mutation.
pub struct Library {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    changes: broadcast::Sender<LibraryChange>,
    next_change: AtomicU64,
}

impl Library {
    /// Open the catalog at its default location.
    ///
    /// The database file is created in the user's data directory:
    /// - Linux: ~/.local/share/album-grid/catalog.db
    /// - macOS: ~/Library/Application Support/album-grid/catalog.db
    /// - Windows: %APPDATA%\album-grid\catalog.db
    pub fn new() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open or create the catalog at `db_path`
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        info!("Catalog opened at {}", db_path.display());

        let (changes, _) = broadcast::channel(64);
        let library = Library {
            conn: Mutex::new(conn),
            db_path,
            changes,
            next_change: AtomicU64::new(1),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Get the path where the database should be stored
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(Error::NoDirectory("data"))?;

        path.push("album-grid");
        path.push("catalog.db");
        Ok(path)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                media_type      TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                modified_at     INTEGER NOT NULL,
                imported_at     INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL
            )",
            [],
        )?;

        // Columns added after the first release; the ALTER fails harmlessly
        // when the column already exists
        let _ = conn.execute(
            "ALTER TABLE assets ADD COLUMN favorite INTEGER NOT NULL DEFAULT 0",
            [],
        );
        let _ = conn.execute(
            "ALTER TABLE assets ADD COLUMN file_status TEXT NOT NULL DEFAULT 'exists'",
            [],
        );

        // Every fetch sorts by these two columns
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_created
             ON assets(created_at DESC, modified_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_file_status
             ON assets(file_status)",
            [],
        )?;

        debug!("Catalog schema initialized");

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Count all assets that still exist on disk
    pub fn asset_count(&self) -> Result<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM assets WHERE file_status = 'exists'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Add scanned files to the catalog in a single transaction.
    /// Files whose path is already catalogued are skipped, unless the row
    /// was marked deleted; such a file is back on disk and is restored.
    pub fn import_files(&self, files: Vec<ScannedFile>) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        let now = Utc::now().timestamp();

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;

            for file in files {
                let path_str = file.path.to_string_lossy().to_string();
                let filename = file
                    .path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();

                let inserted = tx.execute(
                    "INSERT INTO assets
                        (path, filename, media_type, created_at, modified_at, imported_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(path) DO UPDATE SET
                        file_status = 'exists',
                        created_at = excluded.created_at,
                        modified_at = excluded.modified_at,
                        imported_at = excluded.imported_at
                     WHERE assets.file_status = 'deleted'",
                    rusqlite::params![
                        &path_str,
                        &filename,
                        file.kind.as_str(),
                        file.created_at.timestamp(),
                        file.modified_at.timestamp(),
                        now,
                    ],
                );

                match inserted {
                    Ok(0) => {
                        // UNIQUE(path): already in the catalog
                        result.skipped_count += 1;
                    }
                    Ok(_) => {
                        result.imported_count += 1;
                        if result.imported_count % 100 == 0 {
                            debug!("Imported {} files...", result.imported_count);
                        }
                    }
                    Err(e) => {
                        warn!("Error importing {}: {}", filename, e);
                    }
                }
            }

            tx.commit()?;
        }

        if result.imported_count > 0 {
            self.notify(ChangeKind::Imported {
                count: result.imported_count,
            });
        }

        Ok(result)
    }

    /// Fetch every existing asset matching `media_type`, newest first
    pub fn fetch_all(&self, media_type: MediaType) -> Result<AssetFetch> {
        self.query_assets(media_type, None)
    }

    /// Fetch the members of a smart album matching `media_type`, newest first.
    /// Unknown album ids yield an empty fetch.
    pub fn fetch_smart(&self, album_id: &str, media_type: MediaType) -> Result<AssetFetch> {
        match SmartKind::from_id(album_id) {
            Some(kind) => self.query_assets(media_type, Some(kind.sql_condition(Utc::now()))),
            None => {
                warn!("Unknown smart album: {}", album_id);
                Ok(AssetFetch::default())
            }
        }
    }

    fn query_assets(&self, media_type: MediaType, extra: Option<String>) -> Result<AssetFetch> {
        let mut sql = format!(
            "SELECT {} FROM assets WHERE file_status = 'exists' AND {}",
            ASSET_COLUMNS,
            media_type.sql_condition()
        );
        if let Some(condition) = extra {
            sql.push_str(" AND ");
            sql.push_str(&condition);
        }
        sql.push_str(" ORDER BY created_at DESC, modified_at DESC, id DESC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let assets = stmt
            .query_map([], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(AssetFetch::new(assets))
    }

    /// Smart album descriptors. Membership is computed per fetch, so no
    /// count is known up front.
    pub fn smart_album_list(&self) -> Vec<SmartAlbum> {
        SmartKind::ALL
            .into_iter()
            .map(|kind| SmartAlbum {
                id: kind.id().to_string(),
                title: kind.title().to_string(),
                estimated_count: None,
            })
            .collect()
    }

    /// Set or clear an asset's favorite flag
    pub fn update_favorite(&self, asset_id: i64, favorite: bool) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE assets SET favorite = ?1 WHERE id = ?2",
            rusqlite::params![favorite, asset_id],
        )?;
        self.notify(ChangeKind::FavoriteChanged { asset_id });
        Ok(())
    }

    /// Read the stored access grant, if the user has ever answered
    pub fn access_grant(&self) -> Result<Option<AuthorizationStatus>> {
        let value: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [ACCESS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|v| match v.as_str() {
            "full" => Some(AuthorizationStatus::Authorized),
            "limited" => Some(AuthorizationStatus::Limited),
            "denied" => Some(AuthorizationStatus::Denied),
            _ => None,
        }))
    }

    /// Persist the user's answer. Only user-grantable states are stored;
    /// anything else clears the grant.
    pub fn store_access_grant(&self, status: AuthorizationStatus) -> Result<()> {
        let value = match status {
            AuthorizationStatus::Authorized => Some("full"),
            AuthorizationStatus::Limited => Some("limited"),
            AuthorizationStatus::Denied => Some("denied"),
            AuthorizationStatus::NotDetermined | AuthorizationStatus::Restricted => None,
        };

        {
            let conn = self.conn.lock();
            match value {
                Some(value) => conn.execute(
                    "INSERT INTO settings (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    [ACCESS_KEY, value],
                )?,
                None => conn.execute("DELETE FROM settings WHERE key = ?1", [ACCESS_KEY])?,
            };
        }

        self.notify(ChangeKind::AccessChanged { status });
        Ok(())
    }

    /// The catalog is restricted when its database file cannot be written
    fn is_restricted(&self) -> bool {
        std::fs::metadata(&self.db_path)
            .map(|meta| meta.permissions().readonly())
            .unwrap_or(false)
    }

    /// Verify that media files still exist on disk.
    /// Mark as 'deleted' if the file is missing.
    pub fn verify_files(&self) -> Result<usize> {
        let deleted_count = {
            let conn = self.conn.lock();
            let mut stmt =
                conn.prepare("SELECT id, path FROM assets WHERE file_status = 'exists'")?;

            let existing: Vec<(i64, String)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();

            let mut deleted_count = 0;
            for (id, file_path) in existing {
                if !Path::new(&file_path).exists() {
                    conn.execute(
                        "UPDATE assets SET file_status = 'deleted' WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    deleted_count += 1;
                }
            }
            deleted_count
        };

        if deleted_count > 0 {
            warn!("Marked {} missing files as deleted", deleted_count);
            self.notify(ChangeKind::FilesMissing {
                count: deleted_count,
            });
        }

        Ok(deleted_count)
    }

    /// Broadcast a change token to every subscriber
    fn notify(&self, kind: ChangeKind) {
        let change = LibraryChange {
            serial: self.next_change.fetch_add(1, Ordering::Relaxed),
            kind,
        };
        if self.changes.send(change).is_err() {
            debug!("No change subscribers for {:?}", kind);
        }
    }
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let path: String = row.get(1)?;
    let media_type: String = row.get(3)?;
    let kind = AssetKind::parse(&media_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown media type '{}'", media_type).into(),
        )
    })?;

    Ok(Asset {
        id: row.get(0)?,
        path: PathBuf::from(path),
        filename: row.get(2)?,
        kind,
        created_at: timestamp(row.get(4)?),
        modified_at: timestamp(row.get(5)?),
        favorite: row.get(6)?,
    })
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl PhotoLibrary for Library {
    fn fetch_assets(&self, media_type: MediaType) -> Result<AssetFetch> {
        self.fetch_all(media_type)
    }

    fn smart_albums(&self) -> Result<Vec<SmartAlbum>> {
        Ok(self.smart_album_list())
    }

    fn fetch_assets_in(&self, album: &SmartAlbum, media_type: MediaType) -> Result<AssetFetch> {
        self.fetch_smart(&album.id, media_type)
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        if self.is_restricted() {
            return AuthorizationStatus::Restricted;
        }
        match self.access_grant() {
            Ok(Some(status)) => status,
            Ok(None) => AuthorizationStatus::NotDetermined,
            Err(e) => {
                warn!("Could not read library access grant: {}", e);
                AuthorizationStatus::NotDetermined
            }
        }
    }

    fn record_authorization(&self, status: AuthorizationStatus) -> Result<()> {
        self.store_access_grant(status)
    }

    fn set_favorite(&self, asset_id: i64, favorite: bool) -> Result<()> {
        self.update_favorite(asset_id, favorite)
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
