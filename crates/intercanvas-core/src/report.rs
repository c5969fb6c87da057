//! Gardens report placement.
//!
//! A rendered report is an image with clickable regions. Sending it to the
//! canvas creates one Image box plus one Link overlay per region, each
//! overlay owned by the image so moves and resizes cascade to it.

use crate::boxes::{BoxContent, BoxId, overlay_id};
use crate::geometry::{
    Alignment, BoxRect, GeometryError, align_within, fit_width, rescale_proportional, validate_rect,
};
use crate::store::{BoxStore, DEFAULT_MIN_BOX_SIZE, NewBox};
use serde::{Deserialize, Serialize};

/// A clickable region, in the image's natural pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLink {
    pub rect: BoxRect,
    pub url: String,
    #[serde(default = "default_true")]
    pub open_in_new_tab: bool,
}

fn default_true() -> bool {
    true
}

/// A rendered report image and its link regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportImage {
    pub src: String,
    pub natural_width: i32,
    pub natural_height: i32,
    #[serde(default)]
    pub links: Vec<ReportLink>,
}

/// Where and how large the report lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub width: i32,
    pub alignment: Alignment,
    pub canvas_width: i32,
    pub top: i32,
    pub overlay_min_size: i32,
}

impl Placement {
    pub fn new(width: i32, canvas_width: i32) -> Self {
        Self {
            width,
            alignment: Alignment::Center,
            canvas_width,
            top: 0,
            overlay_min_size: DEFAULT_MIN_BOX_SIZE,
        }
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn top(mut self, top: i32) -> Self {
        self.top = top;
        self
    }

    pub fn overlay_min_size(mut self, min: i32) -> Self {
        self.overlay_min_size = min;
        self
    }
}

/// Ids created by [`send_to_canvas`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedReport {
    pub parent: BoxId,
    pub overlays: Vec<BoxId>,
}

impl PlacedReport {
    /// Parent first, then overlays in link order.
    pub fn all_ids(&self) -> Vec<BoxId> {
        std::iter::once(self.parent.clone())
            .chain(self.overlays.iter().cloned())
            .collect()
    }
}

/// Place a report image and its link overlays on the canvas.
///
/// All geometry is computed up front; on error nothing is created. The image
/// box ends up selected.
pub fn send_to_canvas(
    store: &mut BoxStore,
    image: &ReportImage,
    placement: Placement,
) -> Result<PlacedReport, GeometryError> {
    let height = fit_width(image.natural_width, image.natural_height, placement.width)?;
    let x = align_within(placement.canvas_width, placement.width, placement.alignment);
    let parent_rect = validate_rect(BoxRect::new(x, placement.top, placement.width, height))?;
    let natural = BoxRect::new(0, 0, image.natural_width, image.natural_height);

    let overlay_rects = image
        .links
        .iter()
        .map(|link| rescale_proportional(natural, parent_rect, link.rect))
        .collect::<Result<Vec<_>, _>>()?;

    let parent = store.create_box(
        NewBox::new(parent_rect)
            .content(BoxContent::image(image.src.clone()))
            .name("Gardens report")
            .min_size(1),
    );

    let mut overlays = Vec::with_capacity(image.links.len());
    for (index, (link, rect)) in image.links.iter().zip(overlay_rects).enumerate() {
        let id = store.create_box(
            NewBox::new(rect)
                .id(overlay_id(&parent, index))
                .parent(parent.clone())
                .content(BoxContent::link(link.url.clone(), link.open_in_new_tab))
                .name(format!("Link {}", index + 1))
                .min_size(placement.overlay_min_size),
        );
        overlays.push(id);
    }

    store.set_selected(Some(parent.clone()));
    log::info!(
        "Placed report {} with {} link overlays at {:?}",
        parent,
        overlays.len(),
        parent_rect
    );
    Ok(PlacedReport { parent, overlays })
}

/// Re-align a placed report horizontally; overlays follow.
/// Returns the ids whose geometry changed.
pub fn realign(
    store: &mut BoxStore,
    parent: &str,
    alignment: Alignment,
    canvas_width: i32,
) -> Result<Vec<BoxId>, GeometryError> {
    let Some(rect) = store.get(parent).map(|b| b.rect) else {
        return Ok(Vec::new());
    };
    let x = align_within(canvas_width, rect.w, alignment);
    store.set_rect(parent, rect.with_position(x, rect.y))
}
