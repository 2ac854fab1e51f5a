/// Photo grid: fixed three-column layout with on-demand thumbnails
///
/// Only the rows around the viewport are materialized. A cell that scrolls
/// out of that range is recycled: its bitmap is dropped and its pending
/// request cancelled. Results are applied only to the cell that asked for
/// them.
use iced::widget::{button, column, container, image, row, scrollable, stack, text, Space};
use iced::{Alignment, ContentFit, Element, Length, Padding};
use std::collections::HashMap;
use std::ops::Range;
use tokio_util::sync::CancellationToken;

use crate::imaging::thumbnail::{FitMode, TargetSize};
use crate::photos::loader::{ImageManager, ImageRequest, RequestId, RequestOptions};
use crate::state::data::Asset;
use crate::Message;

pub const COLUMNS: usize = 3;

/// Rows kept alive above and below the viewport
const OVERSCAN_ROWS: usize = 1;

/// Fit mode for grid thumbnails; cells are square and fully covered
const CELL_FIT: FitMode = FitMode::AspectFill;

/// The grid's scrollable, so the shell can reset it when the album changes
pub fn scroll_id() -> scrollable::Id {
    scrollable::Id::new("photo-grid")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub spacing: f32,
}

impl GridLayout {
    /// Side of a square cell when the grid is `width` wide
    pub fn cell_side(&self, width: f32) -> f32 {
        let gaps = self.spacing * (COLUMNS - 1) as f32;
        ((width - gaps) / COLUMNS as f32).max(1.0)
    }

    /// Cell side plus the gap below it
    pub fn row_height(&self, width: f32) -> f32 {
        self.cell_side(width) + self.spacing
    }

    pub fn row_count(count: usize) -> usize {
        count.div_ceil(COLUMNS)
    }

    /// Indices whose rows intersect the viewport, plus overscan
    pub fn visible_range(&self, viewport: &GridViewport, count: usize) -> Range<usize> {
        if count == 0 || viewport.height <= 0.0 {
            return 0..0;
        }

        let row_height = self.row_height(viewport.width);
        let offset = viewport.offset_y.max(0.0);
        let first_row = ((offset / row_height).floor() as usize).saturating_sub(OVERSCAN_ROWS);
        let last_row = ((offset + viewport.height) / row_height).ceil() as usize + OVERSCAN_ROWS;
        let last_row = last_row.min(Self::row_count(count));

        let start = (first_row * COLUMNS).min(count);
        let end = (last_row * COLUMNS).min(count);
        start..end
    }
}

/// Visible part of the grid
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridViewport {
    pub width: f32,
    pub height: f32,
    pub offset_y: f32,
}

#[derive(Debug, Default)]
struct Cell {
    request: Option<(RequestId, CancellationToken)>,
    image: Option<image::Handle>,
}

impl Cell {
    /// Drop the bitmap and abandon any pending request
    fn prepare_for_reuse(&mut self) {
        if let Some((_, token)) = self.request.take() {
            token.cancel();
        }
        self.image = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPhase {
    /// An album is selected but its assets have not arrived yet
    Loading { album: usize },
    Loaded { album: usize },
}

#[derive(Debug)]
pub struct GridState {
    layout: GridLayout,
    viewport: GridViewport,
    /// Pixels per layout unit when sizing requests
    scale: f32,
    options: RequestOptions,
    phase: GridPhase,
    /// Working set of the selected album
    assets: Vec<Asset>,
    cells: HashMap<usize, Cell>,
}

impl GridState {
    pub fn new(
        layout: GridLayout,
        viewport: GridViewport,
        scale: f32,
        options: RequestOptions,
    ) -> Self {
        Self {
            layout,
            viewport,
            scale,
            options,
            phase: GridPhase::Loading { album: 0 },
            assets: Vec::new(),
            cells: HashMap::new(),
        }
    }

    pub fn phase(&self) -> GridPhase {
        self.phase
    }

    pub fn selected_album(&self) -> usize {
        match self.phase {
            GridPhase::Loading { album } | GridPhase::Loaded { album } => album,
        }
    }

    pub fn count(&self) -> usize {
        self.assets.len()
    }

    pub fn asset(&self, index: usize) -> Option<&Asset> {
        self.assets.get(index)
    }

    pub fn image(&self, index: usize) -> Option<&image::Handle> {
        self.cells.get(&index).and_then(|cell| cell.image.as_ref())
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.layout.visible_range(&self.viewport, self.count())
    }

    /// Pixel size requested for every cell
    pub fn target_size(&self) -> TargetSize {
        let side = self.layout.cell_side(self.viewport.width) * self.scale;
        TargetSize::square(side.ceil() as u32)
    }

    /// Start showing album `album`. Returns false for an index outside
    /// `0..album_count`, leaving the grid untouched.
    pub fn select(&mut self, album: usize, album_count: usize) -> bool {
        if album >= album_count {
            return false;
        }

        self.clear();
        self.assets.clear();
        self.viewport.offset_y = 0.0;
        self.phase = GridPhase::Loading { album };
        true
    }

    /// Replace the working set. Assets for an album that is no longer
    /// selected are ignored.
    pub fn assets_loaded(&mut self, album: usize, assets: Vec<Asset>) -> bool {
        if album != self.selected_album() {
            return false;
        }

        self.clear();
        self.assets = assets;
        self.phase = GridPhase::Loaded { album };
        true
    }

    pub fn set_viewport(&mut self, viewport: GridViewport) {
        if (viewport.width - self.viewport.width).abs() > f32::EPSILON {
            // Cell size changed; every bitmap has the wrong size now
            self.clear();
        }
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> GridViewport {
        self.viewport
    }

    /// Recycle cells that left the visible range and request images for
    /// cells that entered it
    pub fn refresh(&mut self, images: &ImageManager) -> Vec<(usize, ImageRequest)> {
        let range = self.visible_range();

        let leaving: Vec<usize> = self
            .cells
            .keys()
            .copied()
            .filter(|index| !range.contains(index))
            .collect();
        for index in leaving {
            if let Some(mut cell) = self.cells.remove(&index) {
                cell.prepare_for_reuse();
            }
        }

        let target = self.target_size();
        let mut requests = Vec::new();
        for index in range {
            if self.cells.contains_key(&index) {
                continue;
            }
            let Some(asset) = self.assets.get(index) else {
                continue;
            };

            let request = images.request_image(asset, target, CELL_FIT, self.options);
            self.cells.insert(
                index,
                Cell {
                    request: Some((request.id, request.token.clone())),
                    image: None,
                },
            );
            requests.push((index, request));
        }

        requests
    }

    /// Apply a finished request. Returns false if the cell has been reused
    /// since the request was made.
    pub fn image_loaded(
        &mut self,
        index: usize,
        request: RequestId,
        image: Option<image::Handle>,
    ) -> bool {
        let Some(cell) = self.cells.get_mut(&index) else {
            return false;
        };
        match &cell.request {
            Some((id, _)) if *id == request => {
                cell.request = None;
                cell.image = image;
                true
            }
            _ => false,
        }
    }

    /// Flip the favorite flag of the asset at `index`.
    /// Returns the asset id and the new flag.
    pub fn toggle_favorite(&mut self, index: usize) -> Option<(i64, bool)> {
        let asset = self.assets.get_mut(index)?;
        asset.favorite = !asset.favorite;
        Some((asset.id, asset.favorite))
    }

    /// Recycle every cell
    pub fn clear(&mut self) {
        for (_, mut cell) in self.cells.drain() {
            cell.prepare_for_reuse();
        }
    }
}

impl Drop for GridState {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Build the scrollable grid. Rows outside the visible range are replaced
/// by empty space of the same height.
pub fn view(grid: &GridState) -> Element<'_, Message> {
    if let GridPhase::Loaded { .. } = grid.phase() {
        if grid.count() == 0 {
            return container(text("No items"))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into();
        }
    }

    let viewport = grid.viewport();
    let side = grid.layout.cell_side(viewport.width);
    let row_height = grid.layout.row_height(viewport.width);
    let range = grid.visible_range();

    let total_rows = GridLayout::row_count(grid.count());
    let first_row = range.start / COLUMNS;
    let last_row = range.end.div_ceil(COLUMNS);

    let mut content = column![];
    if first_row > 0 {
        content = content.push(Space::with_height(first_row as f32 * row_height));
    }

    for row_index in first_row..last_row {
        let mut cells = row![].spacing(grid.layout.spacing);
        for column_index in 0..COLUMNS {
            let index = row_index * COLUMNS + column_index;
            if index >= grid.count() {
                break;
            }
            cells = cells.push(cell_view(grid, index, side));
        }
        content = content.push(
            container(cells).padding(Padding {
                bottom: grid.layout.spacing,
                ..Padding::ZERO
            }),
        );
    }

    if total_rows > last_row {
        content = content.push(Space::with_height((total_rows - last_row) as f32 * row_height));
    }

    scrollable(content)
        .id(scroll_id())
        .on_scroll(Message::GridScrolled)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn cell_view(grid: &GridState, index: usize, side: f32) -> Element<'_, Message> {
    let picture: Element<'_, Message> = match grid.image(index) {
        Some(handle) => image(handle.clone())
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Cover)
            .into(),
        None => Space::new(Length::Fill, Length::Fill).into(),
    };

    let favorite = grid.asset(index).map(|a| a.favorite).unwrap_or(false);
    let content: Element<'_, Message> = if favorite {
        stack![
            picture,
            container(text("★").size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .padding(4)
                .align_x(Alignment::End)
                .align_y(Alignment::End),
        ]
        .into()
    } else {
        picture
    };

    button(container(content).style(container::dark).clip(true))
        .on_press(Message::ToggleFavorite(index))
        .padding(0)
        .width(side)
        .height(side)
        .style(button::text)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photos::fake::asset;
    use crate::state::data::AssetKind;

    fn layout() -> GridLayout {
        GridLayout { spacing: 1.0 }
    }

    /// Three 100px columns with 1px gaps, two rows tall
    fn two_rows() -> GridViewport {
        GridViewport {
            width: 302.0,
            height: 202.0,
            offset_y: 0.0,
        }
    }

    fn videos(n: i64) -> Vec<Asset> {
        // Videos fail to decode, so no blocking work outlives the test
        (0..n).map(|id| asset(id, AssetKind::Video, id)).collect()
    }

    fn grid() -> GridState {
        GridState::new(layout(), two_rows(), 2.0, RequestOptions::default())
    }

    #[test]
    fn test_cell_side() {
        assert_eq!(layout().cell_side(302.0), 100.0);
        assert_eq!(layout().row_height(302.0), 101.0);
        assert_eq!(GridLayout::row_count(0), 0);
        assert_eq!(GridLayout::row_count(7), 3);
    }

    #[test]
    fn test_visible_range_with_overscan() {
        assert_eq!(layout().visible_range(&two_rows(), 100), 0..9);
        assert_eq!(layout().visible_range(&two_rows(), 5), 0..5);
        assert_eq!(layout().visible_range(&two_rows(), 0), 0..0);

        let scrolled = GridViewport {
            offset_y: 505.0,
            ..two_rows()
        };
        // Rows 5 and 6 visible, rows 4 and 7 as overscan
        assert_eq!(layout().visible_range(&scrolled, 100), 12..24);
    }

    #[test]
    fn test_target_size_uses_scale() {
        assert_eq!(grid().target_size(), TargetSize::square(200));
    }

    #[test]
    fn test_select_rejects_out_of_range() {
        let mut grid = grid();
        assert!(!grid.select(3, 3));
        assert!(grid.select(2, 3));
        assert_eq!(grid.phase(), GridPhase::Loading { album: 2 });
    }

    #[test]
    fn test_select_starts_at_top() {
        let mut grid = grid();
        grid.set_viewport(GridViewport {
            offset_y: 5050.0,
            ..two_rows()
        });
        assert!(grid.select(0, 2));
        assert!(grid.assets_loaded(0, videos(300)));

        // The shell snaps the scrollable with this id to match
        assert_eq!(grid.viewport().offset_y, 0.0);
        assert_eq!(grid.visible_range(), 0..9);
        assert_eq!(scroll_id(), scroll_id());
    }

    #[test]
    fn test_stale_assets_are_ignored() {
        let mut grid = grid();
        grid.select(1, 3);
        grid.select(2, 3);

        assert!(!grid.assets_loaded(1, videos(4)));
        assert_eq!(grid.count(), 0);

        assert!(grid.assets_loaded(2, videos(2)));
        assert_eq!(grid.phase(), GridPhase::Loaded { album: 2 });
        let ids: Vec<_> = (0..grid.count()).map(|i| grid.asset(i).unwrap().id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_refresh_requests_visible_cells_once() {
        let images = ImageManager::new(None);
        let mut grid = grid();
        grid.assets_loaded(0, videos(30));

        let requests = grid.refresh(&images);
        let indices: Vec<_> = requests.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());

        assert!(grid.refresh(&images).is_empty());
    }

    #[tokio::test]
    async fn test_scrolling_cancels_reused_cells() {
        let images = ImageManager::new(None);
        let mut grid = grid();
        grid.assets_loaded(0, videos(60));

        let first = grid.refresh(&images);
        let (index, old) = (first[0].0, &first[0].1);
        assert_eq!(index, 0);

        grid.set_viewport(GridViewport {
            offset_y: 1010.0,
            ..two_rows()
        });
        let second = grid.refresh(&images);
        assert!(!second.is_empty());
        assert!(old.token.is_cancelled());

        // A late result for the recycled cell is dropped
        assert!(!grid.image_loaded(0, old.id, None));
    }

    #[tokio::test]
    async fn test_result_applies_only_to_matching_request() {
        let images = ImageManager::new(None);
        let mut grid = grid();
        grid.assets_loaded(0, videos(3));

        let requests = grid.refresh(&images);
        let (index, request) = &requests[1];
        let other = &requests[2].1;

        assert!(!grid.image_loaded(*index, other.id, None));
        let handle = image::Handle::from_rgba(1, 1, vec![0u8, 0, 0, 255]);
        assert!(grid.image_loaded(*index, request.id, Some(handle)));
        assert!(grid.image(*index).is_some());

        // Delivered once; a second completion is not applied
        assert!(!grid.image_loaded(*index, request.id, None));
        assert!(grid.image(*index).is_some());
    }

    #[tokio::test]
    async fn test_select_recycles_everything() {
        let images = ImageManager::new(None);
        let mut grid = grid();
        grid.assets_loaded(0, videos(9));
        let requests = grid.refresh(&images);

        grid.select(1, 2);
        assert!(requests.iter().all(|(_, r)| r.token.is_cancelled()));
        assert_eq!(grid.count(), 0);
        assert!(grid.refresh(&images).is_empty());
    }

    #[test]
    fn test_toggle_favorite() {
        let mut grid = grid();
        grid.assets_loaded(0, videos(2));
        assert_eq!(grid.toggle_favorite(1), Some((1, true)));
        assert_eq!(grid.toggle_favorite(1), Some((1, false)));
        assert_eq!(grid.toggle_favorite(5), None);
    }
}
