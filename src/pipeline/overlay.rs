use crate::types::LandmarkSet;

/// 21-keypoint hand topology: thumb, four fingers, then the palm knuckle line.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

const CONNECTOR_COLOR: [u8; 4] = [0, 255, 0, 255];
const CONNECTOR_WIDTH: i32 = 5;
const LANDMARK_COLOR: [u8; 4] = [255, 0, 0, 255];
const LANDMARK_RADIUS: i32 = 4;

/// Draws every hand of `landmarks` onto an RGBA buffer in place.
pub fn draw_landmarks(rgba: &mut [u8], width: u32, height: u32, landmarks: &LandmarkSet) {
    let mut canvas = Canvas {
        rgba,
        width: width as i32,
        height: height as i32,
    };

    for hand in &landmarks.hands {
        for &(a, b) in HAND_CONNECTIONS {
            if let (Some(&from), Some(&to)) = (hand.points.get(a), hand.points.get(b)) {
                canvas.line(from, to, CONNECTOR_WIDTH, CONNECTOR_COLOR);
            }
        }
        for &(x, y) in &hand.points {
            canvas.disc(x.round() as i32, y.round() as i32, LANDMARK_RADIUS, LANDMARK_COLOR);
        }
    }
}

struct Canvas<'a> {
    rgba: &'a mut [u8],
    width: i32,
    height: i32,
}

impl Canvas<'_> {
    fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(px) = self.rgba.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }

    fn disc(&mut self, cx: i32, cy: i32, radius: i32, color: [u8; 4]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Bresenham walk stamping a disc of half the stroke width at each step.
    fn line(&mut self, from: (f32, f32), to: (f32, f32), width: i32, color: [u8; 4]) {
        let (mut x, mut y) = (from.0.round() as i32, from.1.round() as i32);
        let (x1, y1) = (to.0.round() as i32, to.1.round() as i32);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let radius = (width.max(1) - 1) / 2;
        let mut err = dx + dy;

        loop {
            self.disc(x, y, radius, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}
