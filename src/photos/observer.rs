/// Library change notifications
///
/// The catalog sends a [`LibraryChange`] for every mutation. The app only
/// logs them; it does not refresh the album list or the grid.
use iced::futures::{SinkExt, Stream};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::authorization::AuthorizationStatus;
use super::PhotoLibrary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Imported { count: usize },
    FavoriteChanged { asset_id: i64 },
    AccessChanged { status: AuthorizationStatus },
    FilesMissing { count: usize },
}

/// Token describing one mutation of the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryChange {
    /// Increases by one per mutation
    pub serial: u64,
    pub kind: ChangeKind,
}

/// Handle a change token
pub fn library_did_change(change: &LibraryChange) {
    info!("Photo library changed (#{}): {:?}", change.serial, change.kind);
}

/// Next token from `receiver`, skipping over lagged notifications.
/// Returns None once the library is gone.
pub async fn next_change(
    receiver: &mut broadcast::Receiver<LibraryChange>,
) -> Option<LibraryChange> {
    loop {
        match receiver.recv().await {
            Ok(change) => return Some(change),
            Err(RecvError::Lagged(missed)) => {
                warn!("Missed {} library change notifications", missed);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Stream of change tokens for an iced subscription
pub fn changes(library: Arc<dyn PhotoLibrary>) -> impl Stream<Item = LibraryChange> {
    iced::stream::channel(16, move |mut output| async move {
        let mut receiver = library.subscribe();
        while let Some(change) = next_change(&mut receiver).await {
            if output.send(change).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_change_skips_lag_and_ends_on_close() {
        let (tx, mut rx) = broadcast::channel(1);
        let token = |serial| LibraryChange {
            serial,
            kind: ChangeKind::Imported { count: 1 },
        };

        tx.send(token(1)).unwrap();
        tx.send(token(2)).unwrap();
        // Capacity 1: token 1 was overwritten
        assert_eq!(next_change(&mut rx).await, Some(token(2)));

        drop(tx);
        assert_eq!(next_change(&mut rx).await, None);
    }
}
