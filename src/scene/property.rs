/*
 *  scene/property.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Typed, bounded, serializable scene properties
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::pixelcolor::Rgb888;
use log::warn;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Error type for property construction/loading.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("required property '{0}' not found")]
    MissingRequired(String),
    #[error("property '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
}

impl PropertyError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        PropertyError::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// 24-bit RGB color, stored as one channel per byte.
///
/// Serializes as a packed `0xRRGGBB` integer so color values stay compact in
/// preset JSON and stable across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xFF) as u8,
            g: ((packed >> 8) & 0xFF) as u8,
            b: (packed & 0xFF) as u8,
        }
    }

    pub fn packed(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl From<Color> for Rgb888 {
    fn from(c: Color) -> Self {
        Rgb888::new(c.r, c.g, c.b)
    }
}

/// A value type usable inside a [`Property`].
///
/// Implemented for bool, i64, f64, String, [`Color`] and [`EnumValue`].
pub trait PropertyValue: Clone + Send + 'static {
    /// Stable type tag reported in property descriptors ("int", "bool", ...).
    fn type_id() -> &'static str;

    /// Whether an unparseable *optional* value keeps the default instead of
    /// failing construction. Only enum tags behave this way.
    const LENIENT_OPTIONAL: bool = false;

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError>;

    fn emit(&self) -> Value;

    /// Clamp into `[min, max]`. Identity for non-ordered types.
    fn clamp_between(self, _min: Option<&Self>, _max: Option<&Self>) -> Self {
        self
    }

    /// Extra descriptor metadata (enum variant lists). No-op by default.
    fn describe_extra(_out: &mut Map<String, Value>) {}
}

impl PropertyValue for bool {
    fn type_id() -> &'static str {
        "bool"
    }

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        v.as_bool()
            .ok_or_else(|| PropertyError::invalid(name, format!("expected bool, got {}", v)))
    }

    fn emit(&self) -> Value {
        Value::Bool(*self)
    }
}

impl PropertyValue for i64 {
    fn type_id() -> &'static str {
        "int"
    }

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        v.as_i64()
            .ok_or_else(|| PropertyError::invalid(name, format!("expected integer, got {}", v)))
    }

    fn emit(&self) -> Value {
        json!(*self)
    }

    fn clamp_between(self, min: Option<&Self>, max: Option<&Self>) -> Self {
        let mut out = self;
        if let Some(m) = min {
            out = out.max(*m);
        }
        if let Some(m) = max {
            out = out.min(*m);
        }
        out
    }
}

impl PropertyValue for f64 {
    fn type_id() -> &'static str {
        "float"
    }

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        v.as_f64()
            .ok_or_else(|| PropertyError::invalid(name, format!("expected number, got {}", v)))
    }

    fn emit(&self) -> Value {
        json!(*self)
    }

    fn clamp_between(self, min: Option<&Self>, max: Option<&Self>) -> Self {
        let mut out = self;
        if let Some(m) = min {
            if out < *m {
                out = *m;
            }
        }
        if let Some(m) = max {
            if out > *m {
                out = *m;
            }
        }
        out
    }
}

impl PropertyValue for String {
    fn type_id() -> &'static str {
        "string"
    }

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| PropertyError::invalid(name, format!("expected string, got {}", v)))
    }

    fn emit(&self) -> Value {
        Value::String(self.clone())
    }
}

impl PropertyValue for Color {
    fn type_id() -> &'static str {
        "color"
    }

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        let packed = v
            .as_u64()
            .ok_or_else(|| PropertyError::invalid(name, format!("expected packed color, got {}", v)))?;
        if packed > 0xFF_FF_FF {
            return Err(PropertyError::invalid(name, "color out of 24-bit range"));
        }
        Ok(Color::from_packed(packed as u32))
    }

    fn emit(&self) -> Value {
        json!(self.packed())
    }
}

/// An enum usable as a property value. Variants serialize as their string
/// tag, never their ordinal, so presets survive reordering the enum.
pub trait EnumTag: Clone + Send + 'static {
    fn enum_name() -> &'static str;
    fn variants() -> &'static [&'static str];
    fn tag(&self) -> &'static str;
    fn from_tag(tag: &str) -> Option<Self>;
}

/// Newtype binding an [`EnumTag`] into the property system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue<E: EnumTag>(pub E);

impl<E: EnumTag> EnumValue<E> {
    pub fn get(&self) -> &E {
        &self.0
    }
}

/// UPPER_SNAKE or snake tag to "Title Case" for UI listings.
fn display_name(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut capitalize = true;
    for c in tag.chars() {
        if c == '_' {
            out.push(' ');
            capitalize = true;
        } else if capitalize {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

impl<E: EnumTag> PropertyValue for EnumValue<E> {
    fn type_id() -> &'static str {
        "enum"
    }

    // An optional enum with a bad tag keeps its default instead of failing.
    const LENIENT_OPTIONAL: bool = true;

    fn parse(name: &str, v: &Value) -> Result<Self, PropertyError> {
        let tag = v
            .as_str()
            .ok_or_else(|| PropertyError::invalid(name, "enum property must be a string"))?;
        E::from_tag(tag)
            .map(EnumValue)
            .ok_or_else(|| PropertyError::invalid(name, format!("invalid enum value '{}'", tag)))
    }

    fn emit(&self) -> Value {
        Value::String(self.0.tag().to_string())
    }

    fn describe_extra(out: &mut Map<String, Value>) {
        out.insert("enum_name".into(), json!(E::enum_name()));
        let values: Vec<Value> = E::variants()
            .iter()
            .map(|tag| json!({ "value": tag, "display_name": display_name(tag) }))
            .collect();
        out.insert("enum_values".into(), Value::Array(values));
    }
}

/// A named, typed configuration value owned by a scene or image provider.
#[derive(Debug, Clone)]
pub struct Property<T: PropertyValue> {
    name: &'static str,
    value: T,
    default: T,
    required: bool,
    min: Option<T>,
    max: Option<T>,
}

impl<T: PropertyValue> Property<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            value: default.clone(),
            default,
            required: false,
            min: None,
            max: None,
        }
    }

    /// Construction fails if no value for this property is supplied.
    pub fn required(name: &'static str, default: T) -> Self {
        Self {
            required: true,
            ..Self::new(name, default)
        }
    }

    /// Loaded values are clamped into `[min, max]`.
    pub fn bounded(name: &'static str, default: T, min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::new(name, default)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// This does not persist anything; callers save the store themselves.
    pub fn set(&mut self, value: T) {
        self.value = value.clamp_between(self.min.as_ref(), self.max.as_ref());
    }

    /// Reset to the declared default (also used to re-seed defaults that are
    /// only known at runtime, e.g. per-scene weight).
    pub fn set_default(&mut self, default: T) {
        self.value = default.clone();
        self.default = default;
    }
}

impl<T: PropertyValue + Copy> Property<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

/// Object-safe view over a [`Property`], used for JSON round-trip and for
/// building the scene-type catalogue exposed to the control plane.
pub trait DynProperty: Send {
    fn name(&self) -> &str;

    fn type_id(&self) -> &'static str;

    /// Bind a value from supplied configuration. Unknown keys in `args` are
    /// ignored by design; a missing non-required key keeps the default.
    fn load_from_json(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError>;

    fn dump_to_json(&self, out: &mut Map<String, Value>);

    /// Full descriptor: name, type, default, required, bounds/enum metadata.
    fn describe(&self) -> Value;
}

impl<T: PropertyValue> DynProperty for Property<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn type_id(&self) -> &'static str {
        T::type_id()
    }

    fn load_from_json(&mut self, args: &Map<String, Value>) -> Result<(), PropertyError> {
        match args.get(self.name) {
            None => {
                if self.required {
                    return Err(PropertyError::MissingRequired(self.name.to_string()));
                }
                self.value = self.default.clone();
            }
            Some(raw) => match T::parse(self.name, raw) {
                Ok(v) => {
                    self.value = v.clamp_between(self.min.as_ref(), self.max.as_ref());
                }
                Err(_) if !self.required && T::LENIENT_OPTIONAL => {
                    warn!(
                        "keeping default for property '{}': unusable value {}",
                        self.name, raw
                    );
                    self.value = self.default.clone();
                }
                Err(e) => return Err(e),
            },
        }

        Ok(())
    }

    fn dump_to_json(&self, out: &mut Map<String, Value>) {
        out.insert(self.name.to_string(), self.value.emit());
    }

    fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), json!(self.name));
        out.insert("type".into(), json!(T::type_id()));
        out.insert("default".into(), self.default.emit());
        out.insert("required".into(), json!(self.required));
        if let Some(min) = &self.min {
            out.insert("min".into(), min.emit());
        }
        if let Some(max) = &self.max {
            out.insert("max".into(), max.emit());
        }
        T::describe_extra(&mut out);
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Pattern {
        Solid,
        Stripes,
        Checkerboard,
    }

    impl EnumTag for Pattern {
        fn enum_name() -> &'static str {
            "Pattern"
        }

        fn variants() -> &'static [&'static str] {
            &["solid", "stripes", "checkerboard"]
        }

        fn tag(&self) -> &'static str {
            match self {
                Pattern::Solid => "solid",
                Pattern::Stripes => "stripes",
                Pattern::Checkerboard => "checkerboard",
            }
        }

        fn from_tag(tag: &str) -> Option<Self> {
            match tag {
                "solid" => Some(Pattern::Solid),
                "stripes" => Some(Pattern::Stripes),
                "checkerboard" => Some(Pattern::Checkerboard),
                _ => None,
            }
        }
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_round_trip_every_type() {
        let mut flag = Property::new("flag", false);
        let mut count = Property::new("count", 3i64);
        let mut ratio = Property::new("ratio", 0.25f64);
        let mut label = Property::new("label", "hello".to_string());
        let mut tint = Property::new("tint", Color::new(0x12, 0x34, 0x56));
        let mut pattern = Property::new("pattern", EnumValue(Pattern::Stripes));

        let mut out = Map::new();
        for p in [
            &flag as &dyn DynProperty,
            &count,
            &ratio,
            &label,
            &tint,
            &pattern,
        ] {
            p.dump_to_json(&mut out);
        }

        flag.set(true);
        count.set(9);
        ratio.set(0.9);
        label.set("other".into());
        tint.set(Color::new(1, 2, 3));
        pattern.set(EnumValue(Pattern::Solid));

        // loading the dump restores the originals
        flag.load_from_json(&out).unwrap();
        count.load_from_json(&out).unwrap();
        ratio.load_from_json(&out).unwrap();
        label.load_from_json(&out).unwrap();
        tint.load_from_json(&out).unwrap();
        pattern.load_from_json(&out).unwrap();

        assert!(!flag.value());
        assert_eq!(count.value(), 3);
        assert_eq!(ratio.value(), 0.25);
        assert_eq!(label.get(), "hello");
        assert_eq!(tint.value(), Color::new(0x12, 0x34, 0x56));
        assert_eq!(*pattern.get().get(), Pattern::Stripes);
    }

    #[test]
    fn test_enum_serializes_as_tag() {
        let pattern = Property::new("pattern", EnumValue(Pattern::Checkerboard));
        let mut out = Map::new();
        pattern.dump_to_json(&mut out);
        assert_eq!(out["pattern"], json!("checkerboard"));
    }

    #[test]
    fn test_missing_required_fails() {
        let mut name = Property::required("device", "unset".to_string());
        let err = name.load_from_json(&Map::new()).unwrap_err();
        assert!(matches!(err, PropertyError::MissingRequired(n) if n == "device"));
    }

    #[test]
    fn test_missing_optional_keeps_default() {
        let mut count = Property::new("count", 7i64);
        count.set(42);
        count.load_from_json(&Map::new()).unwrap();
        assert_eq!(count.value(), 7);
    }

    #[test]
    fn test_bounded_values_clamp() {
        let mut speed = Property::bounded("speed", 1.0f64, 0.1, 5.0);
        speed.load_from_json(&args(json!({ "speed": 80.0 }))).unwrap();
        assert_eq!(speed.value(), 5.0);

        speed.load_from_json(&args(json!({ "speed": -3.0 }))).unwrap();
        assert_eq!(speed.value(), 0.1);

        let mut size = Property::bounded("size", 5i64, 1, 10);
        size.load_from_json(&args(json!({ "size": 200 }))).unwrap();
        assert_eq!(size.value(), 10);
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let mut count = Property::new("count", 1i64);
        assert!(count.load_from_json(&args(json!({ "count": "nope" }))).is_err());
    }

    #[test]
    fn test_invalid_enum_tag_optional_keeps_default() {
        let mut pattern = Property::new("pattern", EnumValue(Pattern::Solid));
        pattern
            .load_from_json(&args(json!({ "pattern": "plaid" })))
            .unwrap();
        assert_eq!(*pattern.get().get(), Pattern::Solid);
    }

    #[test]
    fn test_invalid_enum_tag_required_fails() {
        let mut pattern = Property::required("pattern", EnumValue(Pattern::Solid));
        assert!(pattern
            .load_from_json(&args(json!({ "pattern": "plaid" })))
            .is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut count = Property::new("count", 1i64);
        count
            .load_from_json(&args(json!({ "count": 2, "future_knob": true })))
            .unwrap();
        assert_eq!(count.value(), 2);
    }

    #[test]
    fn test_color_packs_like_a_hex_triplet() {
        let c = Color::from_packed(0xAB_CD_EF);
        assert_eq!((c.r, c.g, c.b), (0xAB, 0xCD, 0xEF));
        assert_eq!(c.packed(), 0xAB_CD_EF);
    }

    #[test]
    fn test_descriptor_carries_bounds_and_variants() {
        let speed = Property::bounded("speed", 1.0f64, 0.1, 5.0);
        let d = speed.describe();
        assert_eq!(d["type"], json!("float"));
        assert_eq!(d["min"], json!(0.1));
        assert_eq!(d["max"], json!(5.0));

        let pattern = Property::new("pattern", EnumValue(Pattern::Solid));
        let d = pattern.describe();
        assert_eq!(d["type"], json!("enum"));
        assert_eq!(d["enum_name"], json!("Pattern"));
        assert_eq!(d["enum_values"][1]["value"], json!("stripes"));
        assert_eq!(d["enum_values"][1]["display_name"], json!("Stripes"));
    }
}
