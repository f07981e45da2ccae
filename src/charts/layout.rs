//! Treemap Layout
//! Squarified layout (Bruls, Huizing, van Wijk): rectangle areas proportional to values.

/// Axis-aligned rectangle in whatever units the caller draws in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl TileRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Inset on every side, never below zero size.
    pub fn shrink(&self, pad: f64) -> Self {
        let pad_x = pad.min(self.w / 2.0);
        let pad_y = pad.min(self.h / 2.0);
        Self::new(
            self.x + pad_x,
            self.y + pad_y,
            self.w - 2.0 * pad_x,
            self.h - 2.0 * pad_y,
        )
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

/// One rect per value, in input order. Non-positive values get an empty rect.
///
/// Best aspect ratios come from values sorted descending.
pub fn squarify(values: &[f64], bounds: TileRect) -> Vec<TileRect> {
    let mut out = vec![TileRect::new(bounds.x, bounds.y, 0.0, 0.0); values.len()];
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 || bounds.area() <= 0.0 {
        return out;
    }

    let scale = bounds.area() / total;
    let items: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .map(|(i, v)| (i, v * scale))
        .collect();

    let mut remaining = bounds;
    let mut idx = 0;

    while idx < items.len() {
        let vertical = remaining.w >= remaining.h;
        let side = if vertical { remaining.h } else { remaining.w };
        if side <= 0.0 {
            break;
        }

        // Greedy row building.
        let start = idx;
        let mut row_area = items[idx].1;
        let mut best = worst_ratio(&items[start..=idx], side, row_area);
        idx += 1;
        while idx < items.len() {
            let trial_area = row_area + items[idx].1;
            let trial = worst_ratio(&items[start..=idx], side, trial_area);
            if trial > best {
                break;
            }
            row_area = trial_area;
            best = trial;
            idx += 1;
        }

        let thickness = row_area / side;
        let mut offset = 0.0;
        for &(slot, area) in &items[start..idx] {
            let length = area / thickness;
            out[slot] = if vertical {
                TileRect::new(remaining.x, remaining.y + offset, thickness, length)
            } else {
                TileRect::new(remaining.x + offset, remaining.y, length, thickness)
            };
            offset += length;
        }

        remaining = if vertical {
            TileRect::new(
                remaining.x + thickness,
                remaining.y,
                (remaining.w - thickness).max(0.0),
                remaining.h,
            )
        } else {
            TileRect::new(
                remaining.x,
                remaining.y + thickness,
                remaining.w,
                (remaining.h - thickness).max(0.0),
            )
        };
    }

    out
}

fn worst_ratio(row: &[(usize, f64)], side: f64, total: f64) -> f64 {
    if side <= 0.0 || total <= 0.0 {
        return f64::MAX;
    }

    let thickness = total / side;
    row.iter()
        .map(|&(_, area)| {
            let length = area / thickness;
            if length > thickness {
                length / thickness
            } else if length > 0.0 {
                thickness / length
            } else {
                f64::MAX
            }
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlap(a: &TileRect, b: &TileRect) -> f64 {
        let w = (a.x + a.w).min(b.x + b.w) - a.x.max(b.x);
        let h = (a.y + a.h).min(b.y + b.h) - a.y.max(b.y);
        w.max(0.0) * h.max(0.0)
    }

    #[test]
    fn areas_are_proportional_and_tiles_do_not_overlap() {
        let values = [6.0, 6.0, 4.0, 3.0, 2.0, 2.0, 1.0];
        let bounds = TileRect::new(0.0, 0.0, 6.0, 4.0);
        let rects = squarify(&values, bounds);

        for (v, r) in values.iter().zip(&rects) {
            assert!((r.area() - v).abs() < 1e-9, "{v} vs {}", r.area());
            assert!(r.x >= -1e-9 && r.y >= -1e-9);
            assert!(r.x + r.w <= 6.0 + 1e-9 && r.y + r.h <= 4.0 + 1e-9);
        }
        for i in 0..rects.len() {
            for j in i + 1..rects.len() {
                assert!(overlap(&rects[i], &rects[j]) < 1e-9);
            }
        }
    }

    #[test]
    fn non_positive_values_get_empty_tiles() {
        let rects = squarify(&[3.0, 0.0, -1.0, 1.0], TileRect::new(0.0, 0.0, 2.0, 2.0));
        assert!((rects[0].area() - 3.0).abs() < 1e-9);
        assert_eq!(rects[1].area(), 0.0);
        assert_eq!(rects[2].area(), 0.0);
        assert!((rects[3].area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_to_lay_out() {
        assert!(squarify(&[], TileRect::new(0.0, 0.0, 1.0, 1.0)).is_empty());
        let rects = squarify(&[0.0], TileRect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(rects[0].area(), 0.0);
    }
}
