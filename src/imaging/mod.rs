/// Image decoding module
///
/// This module handles:
/// - Decoding regular images and embedded RAW previews
/// - Scaling to a target size (fit or fill)
/// - Caching resized bitmaps to disk

pub mod thumbnail;
