use anyhow::{anyhow, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// A buffer of color data, with the bottom-left being `(0,0)`.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    buffer: Vec<Color>,
}

/// An iterator for the rows of the resulting image, starting at the top and working down. This is
/// suitable for using when saving the [`Canvas`].
pub struct Rows<'a> {
    canvas: &'a Canvas,
    row: usize,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self::new(0., 0., 0.)
    }

    pub fn is_black(&self) -> bool {
        self.r == 0. && self.g == 0. && self.b == 0.
    }

    pub fn white() -> Self {
        Self::new(1., 1., 1.)
    }

    pub fn grey() -> Self {
        Self::from_u8(128, 128, 128)
    }

    pub fn light_grey() -> Self {
        Self::from_u8(211, 211, 211)
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255., g as f32 / 255., b as f32 / 255.)
    }

    /// Parse a color of the form `#rrggbb`.
    pub fn from_hex(text: &str) -> Result<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(anyhow!("expected a color of the form #rrggbb, got `{}`", text));
        }
        let channel = |ix: usize| u8::from_str_radix(&hex[ix..ix + 2], 16);
        Ok(Self::from_u8(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_u8(&self) -> [u8; 3] {
        let convert = |x: f32| (x * 255.0).round().clamp(0.0, 255.0) as u8;
        [convert(self.r), convert(self.g), convert(self.b)]
    }

    /// Convert the [`Color`] to grayscale.
    pub fn to_grayscale(&self) -> f32 {
        0.3 * self.r + 0.59 * self.g + 0.11 * self.b
    }

    /// Component-wise product, for filtering light through a surface color.
    pub fn filter(&self, other: &Color) -> Color {
        Color::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }
}

impl std::ops::Mul<&Color> for f32 {
    type Output = Color;
    fn mul(self, rhs: &Color) -> Self::Output {
        Color::new(rhs.r * self, rhs.g * self, rhs.b * self)
    }
}

impl std::ops::Mul<Color> for f32 {
    type Output = Color;
    fn mul(self, rhs: Color) -> Self::Output {
        self * &rhs
    }
}

impl std::ops::Mul<f32> for Color {
    type Output = Color;
    fn mul(self, rhs: f32) -> Self::Output {
        rhs * &self
    }
}

impl std::ops::MulAssign<f32> for Color {
    fn mul_assign(&mut self, rhs: f32) {
        self.r *= rhs;
        self.g *= rhs;
        self.b *= rhs;
    }
}

impl std::ops::Add for Color {
    type Output = Color;
    fn add(mut self, rhs: Color) -> Self::Output {
        self += &rhs;
        self
    }
}

impl std::ops::AddAssign<&Color> for Color {
    fn add_assign(&mut self, rhs: &Color) {
        self.r += rhs.r;
        self.g += rhs.g;
        self.b += rhs.b;
    }
}

impl std::ops::AddAssign for Color {
    fn add_assign(&mut self, rhs: Color) {
        self.add_assign(&rhs)
    }
}

impl Canvas {
    /// Construct a new [`Canvas`].
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width * height) as usize;
        let mut buffer = Vec::with_capacity(size);
        buffer.resize_with(size, Default::default);
        Self {
            width,
            height,
            buffer,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        (self.width as usize) * y + x
    }

    /// Mutate a color in the [`Canvas`].
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut Color {
        let ix = self.index(x, y);
        &mut self.buffer[ix]
    }

    /// Fetch a color in the [`Canvas`].
    pub fn get(&self, x: usize, y: usize) -> &Color {
        let ix = self.index(x, y);
        &self.buffer[ix]
    }

    /// The `(col, row)` coordinates of every pixel, in buffer order.
    pub fn coords(&self) -> impl Iterator<Item = (u32, u32)> {
        let width = self.width;
        (0..self.height).flat_map(move |row| (0..width).map(move |col| (col, row)))
    }

    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut Color> {
        self.buffer.iter_mut()
    }

    /// Copy `chunk` into this canvas with its bottom-left corner at `(x, y)`. Pixels that fall
    /// outside the canvas are dropped.
    pub fn blit(&mut self, x: u32, y: u32, chunk: &Canvas) {
        for (col, row) in chunk.coords() {
            let (cx, cy) = (x + col, y + row);
            if cx < self.width && cy < self.height {
                *self.get_mut(cx as usize, cy as usize) = *chunk.get(col as usize, row as usize);
            }
        }
    }

    /// Return an iterator to the rows of the image.
    pub fn rows(&self) -> Rows {
        Rows {
            canvas: self,
            row: (self.height as usize),
        }
    }

    /// Return raw image RGB8 data for the image.
    pub fn data(&self) -> Vec<u8> {
        let size = (self.width * self.height) as usize;
        let mut data = Vec::with_capacity(size * 3);

        for row in self.rows() {
            for color in row {
                data.extend_from_slice(&color.to_u8())
            }
        }

        data
    }

    /// Return an ascii version of the [`Canvas`].
    pub fn to_ascii(&self) -> String {
        let mut buf = String::new();
        let palette = r#" .'`^",:;Il!i><~+_-?][}{1)(|\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$"#;
        let bytes = palette.as_bytes();
        let bound = (palette.len() - 1) as f32;

        for row in self.rows() {
            for col in row {
                let g = col.to_grayscale().clamp(0., 1.);
                let index = (g * bound).round() as usize;
                buf.push(bytes[index] as char);
            }
            buf.push('\n');
        }

        buf
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a [Color];

    fn next(&mut self) -> Option<Self::Item> {
        if self.row == 0 {
            return None;
        }

        self.row -= 1;

        let len = self.canvas.width as usize;
        let start = self.row * len;

        Some(&self.canvas.buffer[start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::new(1., 0., 0.), Color::from_hex("#ff0000").unwrap());
        assert_eq!([0x66, 0x00, 0xff], Color::from_hex("#6600ff").unwrap().to_u8());
        assert!(Color::from_hex("#ff00").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
    }

    #[test]
    fn test_blit_and_rows() {
        let mut canvas = Canvas::new(3, 2);
        let mut chunk = Canvas::new(2, 1);
        for pixel in chunk.pixels_mut() {
            *pixel = Color::white();
        }
        canvas.blit(2, 1, &chunk);

        assert_eq!(&Color::white(), canvas.get(2, 1));
        assert_eq!(&Color::black(), canvas.get(1, 1));

        // rows start at the top of the image
        let rows: Vec<_> = canvas.rows().collect();
        assert_eq!(2, rows.len());
        assert_eq!(Color::white(), rows[0][2]);
        assert!(rows[1].iter().all(Color::is_black));
    }

    #[test]
    fn test_ascii() {
        let mut canvas = Canvas::new(2, 1);
        *canvas.get_mut(1, 0) = Color::white();
        assert_eq!(" $\n", canvas.to_ascii());
    }
}
