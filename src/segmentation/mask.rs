use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::core::geometry::BBox;
use crate::core::model::FieldElement;

pub const OCCUPIED: Luma<u8> = Luma([255u8]);
pub const EMPTY: Luma<u8> = Luma([0u8]);

/// Binary raster of the page where every element box is painted as occupied.
#[derive(Debug, Clone)]
pub struct OccupancyMask {
    image: GrayImage,
}

impl OccupancyMask {
    pub fn rasterize(elements: &[FieldElement], width: u32, height: u32) -> Self {
        let mut image = GrayImage::from_pixel(width.max(1), height.max(1), EMPTY);
        for element in elements {
            let bbox = element.bbox.clamp_to(image.width(), image.height());
            let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.width as u32, bbox.height as u32);
            draw_filled_rect_mut(&mut image, rect, OCCUPIED);
        }
        Self { image }
    }

    pub fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> BBox {
        BBox::new(0, 0, self.width() as i32, self.height() as i32)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| *p == EMPTY)
    }

    pub fn occupied_pixels(&self) -> u64 {
        self.image.pixels().filter(|p| **p != EMPTY).count() as u64
    }

    /// Occupied pixels per row of `rect`, indexed from the rectangle's top.
    pub fn row_profile(&self, rect: &BBox) -> Vec<u32> {
        let rect = self.clip(rect);
        (rect.y..rect.bottom())
            .map(|y| {
                (rect.x..rect.right())
                    .filter(|&x| self.is_occupied(x, y))
                    .count() as u32
            })
            .collect()
    }

    /// Occupied pixels per column of `rect`, indexed from the rectangle's left.
    pub fn column_profile(&self, rect: &BBox) -> Vec<u32> {
        let rect = self.clip(rect);
        let mut profile = vec![0u32; rect.width.max(0) as usize];
        for y in rect.y..rect.bottom() {
            for (slot, x) in profile.iter_mut().zip(rect.x..rect.right()) {
                if self.is_occupied(x, y) {
                    *slot += 1;
                }
            }
        }
        profile
    }

    fn is_occupied(&self, x: i32, y: i32) -> bool {
        *self.image.get_pixel(x as u32, y as u32) != EMPTY
    }

    fn clip(&self, rect: &BBox) -> BBox {
        rect.intersection(&self.bounds()).unwrap_or_default()
    }
}
