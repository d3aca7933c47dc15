use anyhow::{bail, Context};
use nalgebra::Point3;
use std::str::FromStr;

use super::{
    lexer::{Lexeme, Lexer, Range, Token},
    Error,
};
use crate::{
    camera::{RenderCam, ViewPlane},
    canvas::Color,
    march::MarchConfig,
    params::{Param, ParamSet},
    scene::{Light, Material, ObjectId, ObjectKind, Placement, Scene, SceneObject, Spotlight},
    shapes::{Prim, REPEAT_CELL},
};

type Result<T> = std::result::Result<T, anyhow::Error>;

/// Parse a scene description.
pub fn parse(input: &str) -> Result<Scene> {
    let mut parser = Parser::new(Lexer::new(input))?;
    parser.parse()?;
    parser.finish()
}

struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
    scene: Scene,

    /// Spotlights waiting for their targets to be resolved.
    aims: Vec<(ObjectId, String)>,
}

/// A parenthesized form: a head, its parameters, and an optional nested shape.
struct Form {
    head: String,
    range: Range,
    params: ParamSet,
    child: Option<Prim>,
}

impl Parser {
    fn new(lexer: Lexer) -> Result<Self> {
        let tokens: Vec<Lexeme> = lexer.collect();
        if let Some(bad) = tokens.iter().find(|lexeme| lexeme.token == Token::Error) {
            bail!(Error::Lexer { range: bad.range });
        }

        Ok(Self {
            tokens,
            pos: 0,
            scene: Scene::default(),
            aims: Vec::new(),
        })
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, token: Token) -> bool {
        self.peek().map_or(false, |lexeme| lexeme.token == token)
    }

    /// The range to blame for an error at the current position.
    fn here(&self) -> Range {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(Range { start: 0, end: 0 }, |lexeme| lexeme.range)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parser {
            range: self.here(),
            message: message.into(),
        }
    }

    fn token(&mut self) -> Result<Lexeme> {
        let lexeme = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(lexeme)
    }

    fn guard(&mut self, token: Token) -> Result<Lexeme> {
        if !self.peek_is(token) {
            bail!(self.error(format!("expected {:?}", token)));
        }
        self.token()
    }

    fn lparen(&mut self) -> Result<()> {
        self.guard(Token::LParen)?;
        Ok(())
    }

    fn rparen(&mut self) -> Result<()> {
        self.guard(Token::RParen)?;
        Ok(())
    }

    fn number(&mut self) -> Result<f32> {
        let tok = self.guard(Token::Number)?;
        f32::from_str(&tok.text).with_context(|| Error::Parser {
            range: tok.range,
            message: format!("invalid number `{}`", tok.text),
        })
    }

    fn tuple(&mut self) -> Result<Vec<f32>> {
        self.lparen()?;
        let mut values = Vec::new();
        while self.peek_is(Token::Number) {
            values.push(self.number()?);
        }
        self.rparen()?;
        Ok(values)
    }

    /// The value following a `:symbol`. A symbol with no value is a flag.
    fn value(&mut self) -> Result<Param> {
        let next = match self.peek() {
            Some(lexeme) => lexeme.token,
            None => return Ok(Param::Flag),
        };

        match next {
            Token::Number => Ok(Param::Number(self.number()?)),
            Token::LParen => Ok(Param::Tuple(self.tuple()?)),
            Token::Color => {
                let tok = self.token()?;
                let color = Color::from_hex(&tok.text).with_context(|| Error::Parser {
                    range: tok.range,
                    message: "invalid color".to_string(),
                })?;
                Ok(Param::Color(color))
            }
            Token::Ident => Ok(Param::Ident(self.token()?.text)),
            Token::String => {
                let text = self.token()?.text;
                let body = &text[1..text.len() - 1];
                Ok(Param::Ident(body.replace("\\\"", "\"").replace("\\\\", "\\")))
            }
            _ => Ok(Param::Flag),
        }
    }

    fn params(&mut self) -> Result<ParamSet> {
        let mut params = ParamSet::new();
        while self.peek_is(Token::Symbol) {
            let symbol = self.token()?;
            let name = symbol.text[1..].to_string();
            let value = self.value()?;
            params.add(name, value);
        }
        Ok(params)
    }

    fn form(&mut self) -> Result<Form> {
        self.lparen()?;
        let range = self.here();
        let head = self.guard(Token::Ident)?.text;
        let params = self.params()?;

        let child = if self.peek_is(Token::LParen) {
            let nested = self.form()?;
            let child = prim(&nested)?;
            nested.params.warn_unused(&nested.head);
            Some(child)
        } else {
            None
        };

        self.rparen()?;

        Ok(Form {
            head,
            range,
            params,
            child,
        })
    }

    fn parse(&mut self) -> Result<()> {
        while self.peek().is_some() {
            let form = self.form()?;
            self.command(&form)
                .with_context(|| format!("in `{}` at {}", form.head, form.range))?;
            form.params.warn_unused(&form.head);
        }

        Ok(())
    }

    fn command(&mut self, form: &Form) -> Result<()> {
        let params = &form.params;

        let object = match form.head.as_str() {
            "march" => {
                self.scene.march = MarchConfig::from_params(params)?;
                return Ok(());
            }

            "light" | "spotlight" | "target" => {
                let mut light = Light {
                    intensity: params.find_one_float("intensity", 75.)?,
                    color: params.find_one_color("color", Color::white())?,
                    ..Light::default()
                };

                if form.head == "spotlight" {
                    let defaults = Spotlight::default();
                    light.spot = Some(Spotlight {
                        cone_radius: params.find_one_float("cone-radius", defaults.cone_radius)?,
                        cone_length: params.find_one_float("cone-length", defaults.cone_length)?,
                        target: None,
                    });
                }

                if form.head == "target" {
                    light.mark_target();
                }

                SceneObject::light(light)
            }

            "camera" => {
                let defaults = ViewPlane::default();
                let view = ViewPlane::new(
                    params.find_one_pair("view-min", defaults.min)?,
                    params.find_one_pair("view-max", defaults.max)?,
                    params.find_one_float("view-z", defaults.z)?,
                );
                SceneObject::camera(view).at(RenderCam::default().position)
            }

            _ => {
                let prim = prim(form)?;
                let mut object = SceneObject::shape(prim);
                if let ObjectKind::Shape { march, .. } = &mut object.kind {
                    *march = MarchConfig::from_params(params)?;
                }
                object
            }
        };

        let place = placement(params, object.placement.position)?;
        let mut object = object.with_material(material(params)?).with_placement(place);

        if let Some(name) = params.find_one_ident("name")? {
            if self.scene.find(name).is_some() {
                bail!(Error::Param {
                    name: "name".to_string(),
                    message: format!("`{}` is already defined", name),
                });
            }
            object = object.named(name);
        }

        let id = self.scene.add(object);

        if form.head == "spotlight" {
            if let Some(target) = params.find_one_ident("target")? {
                self.aims.push((id, target.to_string()));
            }
        }

        Ok(())
    }

    /// Aim spotlights at their targets, which may be defined after them.
    fn finish(mut self) -> Result<Scene> {
        for (spot, name) in std::mem::take(&mut self.aims) {
            let target = self
                .scene
                .find(&name)
                .ok_or_else(|| Error::UnknownName(name.clone()))?;
            self.scene
                .aim(spot, target)
                .with_context(|| format!("aiming at `{}`", name))?;
        }

        Ok(self.scene)
    }
}

fn prim(form: &Form) -> Result<Prim> {
    match form.head.as_str() {
        "repeat" => {
            let cell = form.params.find_one_vector("cell", REPEAT_CELL)?;
            if cell.iter().any(|c| *c <= 0.) {
                bail!(Error::Param {
                    name: "cell".to_string(),
                    message: "must be positive in every axis".to_string(),
                });
            }
            match &form.child {
                Some(child) => Ok(Prim::repeat(cell, child.clone())),
                None => bail!(Error::Parser {
                    range: form.range,
                    message: "repeat needs a shape to repeat".to_string(),
                }),
            }
        }

        head => {
            if form.child.is_some() {
                bail!(Error::Parser {
                    range: form.range,
                    message: format!("`{}` takes no nested shape", head),
                });
            }
            Prim::from_params(head, &form.params)
        }
    }
}

fn placement(params: &ParamSet, position: Point3<f32>) -> Result<Placement> {
    let defaults = Placement::default();
    Ok(Placement {
        position: params.find_one_point("position", position)?,
        rotation: params.find_one_vector("rotation", defaults.rotation)?,
        scale: params.find_one_vector("scale", defaults.scale)?,
        pivot: params.find_one_vector("pivot", defaults.pivot)?,
    })
}

fn material(params: &ParamSet) -> Result<Material> {
    let defaults = Material::default();
    Ok(Material {
        diffuse: params.find_one_color("diffuse", defaults.diffuse)?,
        specular: params.find_one_color("specular", defaults.specular)?,
    })
}
