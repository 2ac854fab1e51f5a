/// Album picker: one row per album, labelled "name (count)"
use iced::widget::{container, pick_list};
use iced::{Element, Length};
use std::fmt;

use crate::state::data::AlbumInfo;
use crate::Message;

/// Height reserved for the picker below the grid
pub const PICKER_HEIGHT: f32 = 160.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRow {
    pub index: usize,
    pub label: String,
}

impl fmt::Display for AlbumRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

pub fn row_label(album: &AlbumInfo) -> String {
    format!("{} ({})", album.name, album.count)
}

#[derive(Debug, Clone, Default)]
pub struct AlbumPicker {
    rows: Vec<AlbumRow>,
}

impl AlbumPicker {
    pub fn new(albums: &[AlbumInfo]) -> Self {
        let rows = albums
            .iter()
            .enumerate()
            .map(|(index, album)| AlbumRow {
                index,
                label: row_label(album),
            })
            .collect();
        Self { rows }
    }

    #[cfg(test)]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&AlbumRow> {
        self.rows.get(index)
    }

    pub fn view(&self, selected: usize) -> Element<'_, Message> {
        let list = pick_list(
            self.rows.as_slice(),
            self.row(selected).cloned(),
            Message::AlbumSelected,
        )
        .text_size(24)
        .width(Length::Fill);

        container(list)
            .padding(20)
            .width(Length::Fill)
            .height(PICKER_HEIGHT)
            .center_y(PICKER_HEIGHT)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::AssetFetch;

    #[test]
    fn test_rows_follow_albums() {
        let albums = vec![
            AlbumInfo::new(None, "Photos", AssetFetch::default()),
            AlbumInfo::new(Some("smart/favorites".into()), "Favorites", AssetFetch::default()),
        ];
        let picker = AlbumPicker::new(&albums);

        assert_eq!(picker.row_count(), 2);
        assert_eq!(picker.row(0).unwrap().label, "Photos (0)");
        assert_eq!(picker.row(1).unwrap().to_string(), "Favorites (0)");
        assert!(picker.row(2).is_none());
    }

    #[test]
    fn test_label_includes_count() {
        use crate::photos::fake::asset;
        use crate::state::data::AssetKind;

        let fetch = AssetFetch::new(vec![
            asset(1, AssetKind::Image, 1),
            asset(2, AssetKind::Image, 2),
        ]);
        let album = AlbumInfo::new(None, "Photos", fetch);
        assert_eq!(row_label(&album), "Photos (2)");
    }
}
