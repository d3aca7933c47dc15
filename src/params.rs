use std::cell::Cell;

use anyhow::{bail, Result};
use nalgebra::{Point2, Point3, Vector3};

use crate::canvas::Color;

/// A single named parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Number(f32),
    Tuple(Vec<f32>),
    Color(Color),
    Ident(String),
    Flag,
}

impl Param {
    fn describe(&self) -> &'static str {
        match self {
            Param::Number(_) => "a number",
            Param::Tuple(_) => "a tuple",
            Param::Color(_) => "a color",
            Param::Ident(_) => "a name",
            Param::Flag => "a flag",
        }
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    value: Param,
    used: Cell<bool>,
}

/// Named creation parameters for scene objects. Every lookup supplies the default used when the
/// parameter is absent, and a parameter of the wrong type is an error.
#[derive(Debug, Default)]
pub struct ParamSet {
    entries: Vec<Entry>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: Param) {
        let name = name.into();
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(Entry {
            name,
            value,
            used: Cell::new(false),
        });
    }

    pub fn with(mut self, name: impl Into<String>, value: Param) -> Self {
        self.add(name, value);
        self
    }

    fn lookup(&self, name: &str) -> Option<&Param> {
        self.entries.iter().find(|entry| entry.name == name).map(|entry| {
            entry.used.set(true);
            &entry.value
        })
    }

    pub fn find_one_float(&self, name: &str, default: f32) -> Result<f32> {
        match self.lookup(name) {
            None => Ok(default),
            Some(Param::Number(x)) => Ok(*x),
            Some(other) => bail!("parameter `{}` must be a number, found {}", name, other.describe()),
        }
    }

    pub fn find_one_int(&self, name: &str, default: u32) -> Result<u32> {
        match self.lookup(name) {
            None => Ok(default),
            Some(Param::Number(x)) if x.fract() == 0.0 && *x >= 0.0 => Ok(*x as u32),
            Some(Param::Number(x)) => {
                bail!("parameter `{}` must be a non-negative integer, found {}", name, x)
            }
            Some(other) => bail!("parameter `{}` must be an integer, found {}", name, other.describe()),
        }
    }

    pub fn find_one_vector(&self, name: &str, default: Vector3<f32>) -> Result<Vector3<f32>> {
        match self.lookup(name) {
            None => Ok(default),
            Some(Param::Tuple(xs)) if xs.len() == 3 => Ok(Vector3::new(xs[0], xs[1], xs[2])),
            Some(other) => bail!("parameter `{}` must be a triple, found {}", name, other.describe()),
        }
    }

    pub fn find_one_pair(&self, name: &str, default: Point2<f32>) -> Result<Point2<f32>> {
        match self.lookup(name) {
            None => Ok(default),
            Some(Param::Tuple(xs)) if xs.len() == 2 => Ok(Point2::new(xs[0], xs[1])),
            Some(other) => bail!("parameter `{}` must be a pair, found {}", name, other.describe()),
        }
    }

    pub fn find_one_point(&self, name: &str, default: Point3<f32>) -> Result<Point3<f32>> {
        self.find_one_vector(name, default.coords).map(Point3::from)
    }

    pub fn find_one_color(&self, name: &str, default: Color) -> Result<Color> {
        match self.lookup(name) {
            None => Ok(default),
            Some(Param::Color(c)) => Ok(*c),
            Some(other) => bail!("parameter `{}` must be a color, found {}", name, other.describe()),
        }
    }

    pub fn find_one_ident(&self, name: &str) -> Result<Option<&str>> {
        match self.lookup(name) {
            None => Ok(None),
            Some(Param::Ident(id)) => Ok(Some(id.as_str())),
            Some(other) => bail!("parameter `{}` must be a name, found {}", name, other.describe()),
        }
    }

    /// Flags are true when present with no value.
    pub fn find_flag(&self, name: &str) -> Result<bool> {
        match self.lookup(name) {
            None => Ok(false),
            Some(Param::Flag) => Ok(true),
            Some(other) => bail!("parameter `{}` is a flag, found {}", name, other.describe()),
        }
    }

    /// Names of the parameters that no lookup has asked for.
    pub fn unused(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| !entry.used.get())
            .map(|entry| entry.name.as_str())
    }

    pub fn warn_unused(&self, context: &str) {
        for name in self.unused() {
            log::warn!("{}: parameter `{}` is not used", context, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ParamSet::new();
        assert_eq!(3.0, params.find_one_float("amplitude", 3.0).unwrap());
        assert_eq!(8, params.find_one_int("octave", 8).unwrap());
        assert!(!params.find_flag("target").unwrap());
        assert_eq!(None, params.find_one_ident("target").unwrap());
    }

    #[test]
    fn test_lookup_and_unused() {
        let params = ParamSet::new()
            .with("radius", Param::Number(2.5))
            .with("position", Param::Tuple(vec![1., 2., 3.]))
            .with("bogus", Param::Flag);

        assert_eq!(2.5, params.find_one_float("radius", 1.0).unwrap());
        assert_eq!(
            Point3::new(1., 2., 3.),
            params.find_one_point("position", Point3::origin()).unwrap()
        );
        assert_eq!(vec!["bogus"], params.unused().collect::<Vec<_>>());
        assert!(params.find_one_pair("position", Point2::origin()).is_err());
    }

    #[test]
    fn test_type_errors() {
        let params = ParamSet::new()
            .with("radius", Param::Flag)
            .with("octave", Param::Number(2.5));
        assert!(params.find_one_float("radius", 1.0).is_err());
        assert!(params.find_one_int("octave", 8).is_err());
        assert!(params.find_one_color("radius", Color::black()).is_err());
    }

    #[test]
    fn test_replace() {
        let mut params = ParamSet::new();
        params.add("eps", Param::Number(0.1));
        params.add("eps", Param::Number(0.2));
        assert_eq!(0.2, params.find_one_float("eps", 0.01).unwrap());
    }
}
