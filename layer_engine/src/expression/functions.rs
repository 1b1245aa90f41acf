//! Builtin functions callable from expressions, plus the colour and regular
//! expression values they produce.

use std::fmt;
use std::sync::Arc;

use log::warn;
use regex::{Regex, RegexBuilder};

use super::value::ExprValue;
use crate::error::LayerError;

type UnaryFn = fn(f64) -> f64;
type BinaryFn = fn(f64, f64) -> f64;

fn unary_function(name: &str) -> Option<UnaryFn> {
    let f: UnaryFn = match name {
        "abs" => f64::abs,
        "sqrt" => f64::sqrt,
        "cos" => f64::cos,
        "sin" => f64::sin,
        "tan" => f64::tan,
        "acos" => f64::acos,
        "asin" => f64::asin,
        "atan" => f64::atan,
        "radians" => f64::to_radians,
        "degrees" => f64::to_degrees,
        "sign" => sign,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "round" => round,
        "exp" => f64::exp,
        "exp2" => f64::exp2,
        "log" => f64::ln,
        "log2" => f64::log2,
        "fract" => fract,
        _ => return None,
    };
    Some(f)
}

fn binary_function(name: &str) -> Option<BinaryFn> {
    let f: BinaryFn = match name {
        "atan2" => f64::atan2,
        "pow" => f64::powf,
        "min" => f64::min,
        "max" => f64::max,
        _ => return None,
    };
    Some(f)
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

// Halves round towards +Infinity.
fn round(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn fract(x: f64) -> f64 {
    x - x.floor()
}

pub fn call_builtin(name: &str, args: &[ExprValue]) -> Result<ExprValue, LayerError> {
    if let Some(f) = unary_function(name) {
        let arg = expect_arg(name, args, 0)?;
        return componentwise(name, arg, f);
    }
    if let Some(f) = binary_function(name) {
        let (lhs, rhs) = (expect_arg(name, args, 0)?, expect_arg(name, args, 1)?);
        return match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok(ExprValue::number(f(a, b))),
            _ => Err(LayerError::expression(format!(
                "Function \"{}\" requires number arguments. Arguments are {} and {}.",
                name, lhs, rhs
            ))),
        };
    }
    let first = args.first().cloned().unwrap_or(ExprValue::Undefined);
    match name {
        "Boolean" => Ok(ExprValue::Boolean(first.is_truthy())),
        "Number" => Ok(ExprValue::number(first.to_number())),
        "String" => Ok(ExprValue::String(first.to_string())),
        "isNaN" => Ok(ExprValue::Boolean(first.to_number().is_nan())),
        "isFinite" => Ok(ExprValue::Boolean(first.to_number().is_finite())),
        "color" | "rgb" | "rgba" | "hsl" | "hsla" => {
            literal_color(name, args).map(|c| ExprValue::String(c.to_css_hex()))
        }
        "regExp" => {
            let pattern = match &first {
                ExprValue::Undefined => String::new(),
                other => other.to_string(),
            };
            let flags = match args.get(1) {
                Some(ExprValue::Undefined) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Pattern::new(&pattern, &flags).map(|p| ExprValue::RegExp(Arc::new(p)))
        }
        _ => Err(LayerError::expression(format!(
            "Unexpected function call \"{}\".",
            name
        ))),
    }
}

fn expect_arg<'a>(name: &str, args: &'a [ExprValue], index: usize) -> Result<&'a ExprValue, LayerError> {
    args.get(index).ok_or_else(|| {
        LayerError::expression(format!(
            "Function \"{}\" expects at least {} argument(s), got {}",
            name,
            index + 1,
            args.len()
        ))
    })
}

fn componentwise(name: &str, arg: &ExprValue, f: UnaryFn) -> Result<ExprValue, LayerError> {
    match arg {
        ExprValue::Number(n) => Ok(ExprValue::number(f(n.into_inner()))),
        ExprValue::Array(items) => items
            .iter()
            .map(|item| componentwise(name, item, f))
            .collect::<Result<Vec<_>, _>>()
            .map(ExprValue::Array),
        other => Err(LayerError::expression(format!(
            "Function \"{}\" requires a vector or number argument. Argument is {}.",
            name, other
        ))),
    }
}

fn number_arg(name: &str, args: &[ExprValue], index: usize) -> Result<f64, LayerError> {
    let arg = expect_arg(name, args, index)?;
    arg.as_number().ok_or_else(|| {
        LayerError::expression(format!(
            "Function \"{}\" requires number arguments. Argument {} is {}.",
            name, index, arg
        ))
    })
}

fn literal_color(name: &str, args: &[ExprValue]) -> Result<Color, LayerError> {
    match name {
        "color" => {
            let Some(css) = args.first() else {
                return Ok(Color::WHITE);
            };
            let mut color = css
                .as_str()
                .and_then(Color::from_css)
                .ok_or_else(|| LayerError::expression(format!("wrong literalColor call \"color({})\"", css)))?;
            if args.len() > 1 {
                color.alpha = number_arg(name, args, 1)?;
            }
            Ok(color)
        }
        "rgb" => Ok(Color::from_bytes(
            number_arg(name, args, 0)?,
            number_arg(name, args, 1)?,
            number_arg(name, args, 2)?,
            255.0,
        )),
        "rgba" => Ok(Color::from_bytes(
            number_arg(name, args, 0)?,
            number_arg(name, args, 1)?,
            number_arg(name, args, 2)?,
            number_arg(name, args, 3)? * 255.0,
        )),
        "hsl" => Ok(Color::from_hsl(
            number_arg(name, args, 0)?,
            number_arg(name, args, 1)?,
            number_arg(name, args, 2)?,
            1.0,
        )),
        _ => Ok(Color::from_hsl(
            number_arg(name, args, 0)?,
            number_arg(name, args, 1)?,
            number_arg(name, args, 2)?,
            number_arg(name, args, 3)?,
        )),
    }
}

/// RGBA colour with float components in `0.0..=1.0`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const WHITE: Color = Color {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
        alpha: 1.0,
    };

    pub fn from_bytes(r: f64, g: f64, b: f64, a: f64) -> Self {
        let channel = |v: f64| v.clamp(0.0, 255.0) / 255.0;
        Self {
            red: channel(r),
            green: channel(g),
            blue: channel(b),
            alpha: channel(a),
        }
    }

    /// Hue, saturation and lightness are all fractions in `0.0..=1.0`.
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Self {
        let hue = hue.rem_euclid(1.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);
        if saturation == 0.0 {
            return Self {
                red: lightness,
                green: lightness,
                blue: lightness,
                alpha,
            };
        }
        let m2 = if lightness <= 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let m1 = 2.0 * lightness - m2;
        Self {
            red: hue_to_rgb(m1, m2, hue + 1.0 / 3.0),
            green: hue_to_rgb(m1, m2, hue),
            blue: hue_to_rgb(m1, m2, hue - 1.0 / 3.0),
            alpha,
        }
    }

    /// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()/rgba()`,
    /// `hsl()/hsla()` and CSS colour keywords.
    pub fn from_css(css: &str) -> Option<Self> {
        let css = css.trim();
        if let Some(hex) = css.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let lower = css.to_ascii_lowercase();
        if let Some((func, rest)) = lower.split_once('(') {
            let body = rest.strip_suffix(')')?;
            let parts: Vec<&str> = body
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            return match (func.trim(), parts.as_slice()) {
                ("rgb" | "rgba", [r, g, b, rest @ ..]) => {
                    let alpha = rest.first().map_or(Some(1.0), |a| css_fraction(a))?;
                    Some(Self::from_bytes(
                        css_byte(r)?,
                        css_byte(g)?,
                        css_byte(b)?,
                        alpha * 255.0,
                    ))
                }
                ("hsl" | "hsla", [h, s, l, rest @ ..]) => {
                    let alpha = rest.first().map_or(Some(1.0), |a| css_fraction(a))?;
                    let hue = h.trim_end_matches("deg").parse::<f64>().ok()? / 360.0;
                    Some(Self::from_hsl(hue, css_fraction(s)?, css_fraction(l)?, alpha))
                }
                _ => None,
            };
        }
        named_color(&lower).map(|rgb| {
            Self::from_bytes(
                ((rgb >> 16) & 0xff) as f64,
                ((rgb >> 8) & 0xff) as f64,
                (rgb & 0xff) as f64,
                255.0,
            )
        })
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digit = |i: usize, width: usize| -> Option<f64> {
            let raw = u8::from_str_radix(hex.get(i..i + width)?, 16).ok()?;
            let byte = if width == 1 { raw * 17 } else { raw };
            Some(byte as f64)
        };
        match hex.len() {
            3 | 4 => Some(Self::from_bytes(
                digit(0, 1)?,
                digit(1, 1)?,
                digit(2, 1)?,
                if hex.len() == 4 { digit(3, 1)? } else { 255.0 },
            )),
            6 | 8 => Some(Self::from_bytes(
                digit(0, 2)?,
                digit(2, 2)?,
                digit(4, 2)?,
                if hex.len() == 8 { digit(6, 2)? } else { 255.0 },
            )),
            _ => None,
        }
    }

    /// `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_css_hex(&self) -> String {
        let mut out = format!(
            "#{:02x}{:02x}{:02x}",
            float_to_byte(self.red),
            float_to_byte(self.green),
            float_to_byte(self.blue)
        );
        if self.alpha < 1.0 {
            out.push_str(&format!("{:02x}", float_to_byte(self.alpha)));
        }
        out
    }
}

fn float_to_byte(v: f64) -> u8 {
    let v = v.clamp(0.0, 1.0);
    if v == 1.0 { 255 } else { (v * 256.0) as u8 }
}

fn hue_to_rgb(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue * 6.0 < 1.0 {
        m1 + (m2 - m1) * 6.0 * hue
    } else if hue * 2.0 < 1.0 {
        m2
    } else if hue * 3.0 < 2.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

fn css_byte(part: &str) -> Option<f64> {
    match part.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok().map(|p| p * 2.55),
        None => part.parse::<f64>().ok(),
    }
}

fn css_fraction(part: &str) -> Option<f64> {
    match part.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok().map(|p| p / 100.0),
        None => part.parse::<f64>().ok(),
    }
}

fn named_color(name: &str) -> Option<u32> {
    let rgb = match name {
        "aliceblue" => 0xf0f8ff,
        "antiquewhite" => 0xfaebd7,
        "aqua" | "cyan" => 0x00ffff,
        "aquamarine" => 0x7fffd4,
        "azure" => 0xf0ffff,
        "beige" => 0xf5f5dc,
        "bisque" => 0xffe4c4,
        "black" => 0x000000,
        "blanchedalmond" => 0xffebcd,
        "blue" => 0x0000ff,
        "blueviolet" => 0x8a2be2,
        "brown" => 0xa52a2a,
        "burlywood" => 0xdeb887,
        "cadetblue" => 0x5f9ea0,
        "chartreuse" => 0x7fff00,
        "chocolate" => 0xd2691e,
        "coral" => 0xff7f50,
        "cornflowerblue" => 0x6495ed,
        "cornsilk" => 0xfff8dc,
        "crimson" => 0xdc143c,
        "darkblue" => 0x00008b,
        "darkcyan" => 0x008b8b,
        "darkgoldenrod" => 0xb8860b,
        "darkgray" | "darkgrey" => 0xa9a9a9,
        "darkgreen" => 0x006400,
        "darkkhaki" => 0xbdb76b,
        "darkmagenta" => 0x8b008b,
        "darkolivegreen" => 0x556b2f,
        "darkorange" => 0xff8c00,
        "darkorchid" => 0x9932cc,
        "darkred" => 0x8b0000,
        "darksalmon" => 0xe9967a,
        "darkseagreen" => 0x8fbc8f,
        "darkslateblue" => 0x483d8b,
        "darkslategray" | "darkslategrey" => 0x2f4f4f,
        "darkturquoise" => 0x00ced1,
        "darkviolet" => 0x9400d3,
        "deeppink" => 0xff1493,
        "deepskyblue" => 0x00bfff,
        "dimgray" | "dimgrey" => 0x696969,
        "dodgerblue" => 0x1e90ff,
        "firebrick" => 0xb22222,
        "floralwhite" => 0xfffaf0,
        "forestgreen" => 0x228b22,
        "fuchsia" | "magenta" => 0xff00ff,
        "gainsboro" => 0xdcdcdc,
        "ghostwhite" => 0xf8f8ff,
        "gold" => 0xffd700,
        "goldenrod" => 0xdaa520,
        "gray" | "grey" => 0x808080,
        "green" => 0x008000,
        "greenyellow" => 0xadff2f,
        "honeydew" => 0xf0fff0,
        "hotpink" => 0xff69b4,
        "indianred" => 0xcd5c5c,
        "indigo" => 0x4b0082,
        "ivory" => 0xfffff0,
        "khaki" => 0xf0e68c,
        "lavender" => 0xe6e6fa,
        "lavenderblush" => 0xfff0f5,
        "lawngreen" => 0x7cfc00,
        "lemonchiffon" => 0xfffacd,
        "lightblue" => 0xadd8e6,
        "lightcoral" => 0xf08080,
        "lightcyan" => 0xe0ffff,
        "lightgoldenrodyellow" => 0xfafad2,
        "lightgray" | "lightgrey" => 0xd3d3d3,
        "lightgreen" => 0x90ee90,
        "lightpink" => 0xffb6c1,
        "lightsalmon" => 0xffa07a,
        "lightseagreen" => 0x20b2aa,
        "lightskyblue" => 0x87cefa,
        "lightslategray" | "lightslategrey" => 0x778899,
        "lightsteelblue" => 0xb0c4de,
        "lightyellow" => 0xffffe0,
        "lime" => 0x00ff00,
        "limegreen" => 0x32cd32,
        "linen" => 0xfaf0e6,
        "maroon" => 0x800000,
        "mediumaquamarine" => 0x66cdaa,
        "mediumblue" => 0x0000cd,
        "mediumorchid" => 0xba55d3,
        "mediumpurple" => 0x9370db,
        "mediumseagreen" => 0x3cb371,
        "mediumslateblue" => 0x7b68ee,
        "mediumspringgreen" => 0x00fa9a,
        "mediumturquoise" => 0x48d1cc,
        "mediumvioletred" => 0xc71585,
        "midnightblue" => 0x191970,
        "mintcream" => 0xf5fffa,
        "mistyrose" => 0xffe4e1,
        "moccasin" => 0xffe4b5,
        "navajowhite" => 0xffdead,
        "navy" => 0x000080,
        "oldlace" => 0xfdf5e6,
        "olive" => 0x808000,
        "olivedrab" => 0x6b8e23,
        "orange" => 0xffa500,
        "orangered" => 0xff4500,
        "orchid" => 0xda70d6,
        "palegoldenrod" => 0xeee8aa,
        "palegreen" => 0x98fb98,
        "paleturquoise" => 0xafeeee,
        "palevioletred" => 0xdb7093,
        "papayawhip" => 0xffefd5,
        "peachpuff" => 0xffdab9,
        "peru" => 0xcd853f,
        "pink" => 0xffc0cb,
        "plum" => 0xdda0dd,
        "powderblue" => 0xb0e0e6,
        "purple" => 0x800080,
        "rebeccapurple" => 0x663399,
        "red" => 0xff0000,
        "rosybrown" => 0xbc8f8f,
        "royalblue" => 0x4169e1,
        "saddlebrown" => 0x8b4513,
        "salmon" => 0xfa8072,
        "sandybrown" => 0xf4a460,
        "seagreen" => 0x2e8b57,
        "seashell" => 0xfff5ee,
        "sienna" => 0xa0522d,
        "silver" => 0xc0c0c0,
        "skyblue" => 0x87ceeb,
        "slateblue" => 0x6a5acd,
        "slategray" | "slategrey" => 0x708090,
        "snow" => 0xfffafa,
        "springgreen" => 0x00ff7f,
        "steelblue" => 0x4682b4,
        "tan" => 0xd2b48c,
        "teal" => 0x008080,
        "thistle" => 0xd8bfd8,
        "tomato" => 0xff6347,
        "turquoise" => 0x40e0d0,
        "violet" => 0xee82ee,
        "wheat" => 0xf5deb3,
        "white" => 0xffffff,
        "whitesmoke" => 0xf5f5f5,
        "yellow" => 0xffff00,
        "yellowgreen" => 0x9acd32,
        _ => return None,
    };
    Some(rgb)
}

/// A compiled `regExp(pattern, flags)` value.
#[derive(Debug)]
pub struct Pattern {
    regex: Regex,
    source: String,
    flags: String,
}

impl Pattern {
    pub fn new(source: &str, flags: &str) -> Result<Self, LayerError> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // Stateless matching: global/sticky/unicode change nothing here.
                'g' | 'y' | 'u' => {}
                other => warn!("Ignoring unsupported regExp flag '{}'", other),
            }
        }
        let regex = builder
            .build()
            .map_err(|e| LayerError::expression(format!("Failed to execute the Regex, {}", e)))?;
        Ok(Self {
            regex,
            source: source.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn test(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// First capture group of the first match; `Null` when nothing matches.
    pub fn exec(&self, haystack: &str) -> ExprValue {
        match self.regex.captures(haystack) {
            None => ExprValue::Null,
            Some(caps) => caps
                .get(1)
                .map(|m| ExprValue::String(m.as_str().to_string()))
                .unwrap_or(ExprValue::Undefined),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}
