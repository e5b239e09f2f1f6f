//! Attribute coercion
//!
//! Converts textual attributes into typed values. Every getter looks the
//! attribute up by its exact name first and then retries with the
//! lower-cased name, so `castshadows="false"` satisfies a lookup of
//! `castShadows`. Absent attributes produce the caller's default; malformed
//! numbers are fatal.
//!
//! Composite parsers read a fixed set of sibling attributes on one element:
//!
//! | Parser        | Attributes                              | Missing        |
//! |---------------|-----------------------------------------|----------------|
//! | [`vector3`]   | `x`, `y`, `z`                           | fatal          |
//! | [`colour`]    | `r`, `g`, `b`, `a`                      | `a` = 1        |
//! | [`plane`]     | `x`, `y`, `z`, `d`                      | 0              |
//! | [`float_rect`]| `left`, `top`, `right`, `bottom`        | 0              |
//! | [`quaternion`]| see the function docs                   | identity       |

use crate::foundation::math::{constants, utils, ColourValue, EulerOrder, FloatRect, Plane, Quat, Quaternion, Unit, Vec3};
use crate::host::objects::{render_queue, PixelFormat, TextureType};

use super::document::Element;
use super::error::DocumentCorrupt;

/// Raw attribute text, retrying with the lower-cased name
pub fn lookup<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element.attribute(name).or_else(|| {
        let lowered = name.to_lowercase();
        if lowered == name {
            None
        } else {
            element.attribute(&lowered)
        }
    })
}

/// Attribute text, or `default` when absent
pub fn string(element: &Element, name: &str, default: &str) -> String {
    lookup(element, name).unwrap_or(default).to_string()
}

/// Attribute text, or an empty string when absent
pub fn string_or_empty(element: &Element, name: &str) -> String {
    string(element, name, "")
}

/// Attribute text that must be present
pub fn required_string<'a>(element: &'a Element, name: &str) -> Result<&'a str, DocumentCorrupt> {
    lookup(element, name).ok_or_else(|| DocumentCorrupt::MissingAttribute {
        element: element.tag().to_string(),
        attribute: name.to_string(),
    })
}

fn malformed(element: &Element, name: &str, value: &str) -> DocumentCorrupt {
    DocumentCorrupt::MalformedNumber {
        element: element.tag().to_string(),
        attribute: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_real(element: &Element, name: &str, text: &str) -> Result<f32, DocumentCorrupt> {
    let value: f32 = text.trim().parse().map_err(|_| malformed(element, name, text))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(malformed(element, name, text))
    }
}

fn parse_int(element: &Element, name: &str, text: &str) -> Result<i64, DocumentCorrupt> {
    text.trim().parse().map_err(|_| malformed(element, name, text))
}

/// Real attribute, or `default` when absent
pub fn real(element: &Element, name: &str, default: f32) -> Result<f32, DocumentCorrupt> {
    lookup(element, name).map_or(Ok(default), |text| parse_real(element, name, text))
}

/// Real attribute that must be present
pub fn required_real(element: &Element, name: &str) -> Result<f32, DocumentCorrupt> {
    parse_real(element, name, required_string(element, name)?)
}

/// Integer attribute, or `default` when absent
pub fn int(element: &Element, name: &str, default: i64) -> Result<i64, DocumentCorrupt> {
    lookup(element, name).map_or(Ok(default), |text| parse_int(element, name, text))
}

/// Unsigned integer attribute, or `default` when absent or negative
pub fn unsigned(element: &Element, name: &str, default: u32) -> Result<u32, DocumentCorrupt> {
    let value = int(element, name, i64::from(default))?;
    Ok(u32::try_from(value).unwrap_or(default))
}

/// Flag mask attribute; negative values keep their two's complement bits
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn flags(element: &Element, name: &str, default: u32) -> Result<u32, DocumentCorrupt> {
    let value = int(element, name, i64::from(default))?;
    Ok(value as u32)
}

/// Boolean attribute: only the exact tokens `true` and `false` count
pub fn boolean(element: &Element, name: &str, default: bool) -> bool {
    let exact = element.attribute(name).and_then(parse_bool_token);
    exact
        .or_else(|| {
            let lowered = name.to_lowercase();
            element.attribute(&lowered).and_then(parse_bool_token)
        })
        .unwrap_or(default)
}

fn parse_bool_token(text: &str) -> Option<bool> {
    match text {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Interpret a bare angle: values above pi are degrees, everything else radians
pub fn angle(value: f32) -> f32 {
    if value > constants::PI {
        utils::deg_to_rad(value)
    } else {
        value
    }
}

/// Angle attribute through [`angle`], with a default in radians
pub fn angle_attribute(element: &Element, name: &str, default: f32) -> Result<f32, DocumentCorrupt> {
    Ok(angle(real(element, name, default)?))
}

/// Vector from `x`, `y`, `z`; all three are required
pub fn vector3(element: &Element) -> Result<Vec3, DocumentCorrupt> {
    Ok(Vec3::new(
        required_real(element, "x")?,
        required_real(element, "y")?,
        required_real(element, "z")?,
    ))
}

/// Colour from `r`, `g`, `b` and optional `a`
pub fn colour(element: &Element) -> Result<ColourValue, DocumentCorrupt> {
    Ok(ColourValue::new(
        required_real(element, "r")?,
        required_real(element, "g")?,
        required_real(element, "b")?,
        real(element, "a", 1.0)?,
    ))
}

/// Plane from `x`, `y`, `z` (normal) and `d`, each defaulting to 0
pub fn plane(element: &Element) -> Result<Plane, DocumentCorrupt> {
    Ok(Plane::new(
        Vec3::new(
            real(element, "x", 0.0)?,
            real(element, "y", 0.0)?,
            real(element, "z", 0.0)?,
        ),
        real(element, "d", 0.0)?,
    ))
}

/// Rectangle from `left`, `top`, `right`, `bottom`, each defaulting to 0
pub fn float_rect(element: &Element) -> Result<FloatRect, DocumentCorrupt> {
    Ok(FloatRect::new(
        real(element, "left", 0.0)?,
        real(element, "top", 0.0)?,
        real(element, "right", 0.0)?,
        real(element, "bottom", 0.0)?,
    ))
}

/// Euler composition order from an `order` string such as `"zyx"`
///
/// Only the first two characters matter; strings shorter than two characters
/// select XYZ.
pub fn euler_order(order: &str) -> EulerOrder {
    let mut chars = order.chars();
    let (Some(first), Some(second)) = (chars.next(), chars.next()) else {
        return EulerOrder::Xyz;
    };
    match (first, second) {
        ('x', 'y') => EulerOrder::Xyz,
        ('x', _) => EulerOrder::Xzy,
        ('y', 'x') => EulerOrder::Yxz,
        ('y', _) => EulerOrder::Yzx,
        (_, 'x') => EulerOrder::Zxy,
        (_, _) => EulerOrder::Zyx,
    }
}

/// Rotation from one of four encodings, tried in priority order
///
/// 1. `qw`, `qx`, `qy`, `qz`
/// 2. `axisX`, `axisY`, `axisZ` and `angle` (through [`angle`])
/// 3. `angleX`, `angleY`, `angleZ` (radians) and `order` (default `"x"`)
/// 4. `x`, `y`, `z`, `w`, selected by `x` or by `w`
///
/// An element with none of the marker attributes is the identity.
pub fn quaternion(element: &Element) -> Result<Quat, DocumentCorrupt> {
    if element.has_attribute("qw") {
        return Ok(normalized(
            required_real(element, "qw")?,
            required_real(element, "qx")?,
            required_real(element, "qy")?,
            required_real(element, "qz")?,
        ));
    }
    if element.has_attribute("axisX") {
        let axis = Vec3::new(
            required_real(element, "axisX")?,
            required_real(element, "axisY")?,
            required_real(element, "axisZ")?,
        );
        let radians = angle(required_real(element, "angle")?);
        return Ok(match Unit::try_new(axis, f32::EPSILON) {
            Some(axis) => Quat::from_axis_angle(&axis, radians),
            None => Quat::identity(),
        });
    }
    if element.has_attribute("angleX") {
        let angles = Vec3::new(
            required_real(element, "angleX")?,
            required_real(element, "angleY")?,
            required_real(element, "angleZ")?,
        );
        let order = string(element, "order", "x");
        return Ok(euler_order(&order).to_quaternion(angles));
    }
    if element.has_attribute("x") || element.has_attribute("w") {
        return Ok(normalized(
            required_real(element, "w")?,
            required_real(element, "x")?,
            required_real(element, "y")?,
            required_real(element, "z")?,
        ));
    }
    Ok(Quat::identity())
}

fn normalized(w: f32, x: f32, y: f32, z: f32) -> Quat {
    let raw = Quaternion::new(w, x, y, z);
    if raw.norm_squared() <= f32::EPSILON {
        Quat::identity()
    } else {
        Quat::from_quaternion(raw)
    }
}

/// Render queue groups with their document names
const RENDER_QUEUES: [(&str, u8); 16] = [
    ("background", render_queue::BACKGROUND),
    ("skiesearly", render_queue::SKIES_EARLY),
    ("queue1", render_queue::QUEUE_1),
    ("queue2", render_queue::QUEUE_2),
    ("worldgeometry1", render_queue::WORLD_GEOMETRY_1),
    ("queue3", render_queue::QUEUE_3),
    ("queue4", render_queue::QUEUE_4),
    ("main", render_queue::MAIN),
    ("queue6", render_queue::QUEUE_6),
    ("queue7", render_queue::QUEUE_7),
    ("worldgeometry2", render_queue::WORLD_GEOMETRY_2),
    ("queue8", render_queue::QUEUE_8),
    ("queue9", render_queue::QUEUE_9),
    ("skieslate", render_queue::SKIES_LATE),
    ("overlay", render_queue::OVERLAY),
    ("max", render_queue::MAX),
];

/// Render queue group from its name (case-insensitive, default main)
pub fn render_queue(name: &str) -> u8 {
    RENDER_QUEUES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map_or(render_queue::MAIN, |(_, queue)| *queue)
}

/// Document name of a render queue group, main for unnamed groups
pub fn render_queue_name(queue: u8) -> &'static str {
    RENDER_QUEUES
        .iter()
        .find_map(|(name, candidate)| (*candidate == queue).then_some(*name))
        .unwrap_or("main")
}

/// Optional render queue attribute
pub fn render_queue_attribute(element: &Element, name: &str) -> Option<u8> {
    lookup(element, name).filter(|text| !text.is_empty()).map(render_queue)
}

/// OR of the `bit` attribute over children tagged `child_tag`
pub fn flag_list(element: &Element, child_tag: &str) -> Result<u32, DocumentCorrupt> {
    element
        .children_named(child_tag)
        .try_fold(0u32, |mask, flag| Ok(mask | flags(flag, "bit", 0)?))
}

/// Pixel format by name (case-insensitive, unknown names give FLOAT16_R)
pub fn pixel_format(name: &str) -> PixelFormat {
    PixelFormat::ALL
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map_or(PixelFormat::FLOAT16_R, |(_, format)| *format)
}

/// Texture type by name (case-insensitive, default 2d)
pub fn texture_type(name: &str) -> TextureType {
    match name.to_lowercase().as_str() {
        "1d" => TextureType::OneD,
        "3d" => TextureType::ThreeD,
        "cubic" => TextureType::CubeMap,
        _ => TextureType::TwoD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn el(attributes: &[(&str, &str)]) -> Element {
        attributes
            .iter()
            .fold(Element::new("test"), |e, (k, v)| e.with_attribute(*k, *v))
    }

    #[test]
    fn test_lower_case_retry() {
        let e = el(&[("castshadows", "false"), ("name", "n")]);
        assert!(!boolean(&e, "castShadows", true));
        assert_eq!(string(&e, "Name", "x"), "n");
        assert_eq!(string(&e, "missing", "fallback"), "fallback");
    }

    #[test]
    fn test_boolean_tokens() {
        let cases = [("true", true), ("false", false), ("TRUE", true), ("1", true), ("", true), ("True", true)];
        for (text, expected) in cases {
            assert_eq!(boolean(&el(&[("flag", text)]), "flag", true), expected, "text {text:?}");
        }
        assert!(!boolean(&el(&[("flag", "yes")]), "flag", false));
    }

    #[test]
    fn test_numbers() {
        let e = el(&[("a", "1.5"), ("b", " 42 "), ("c", "abc"), ("d", "-1")]);
        assert_relative_eq!(real(&e, "a", 0.0).unwrap(), 1.5);
        assert_eq!(int(&e, "b", 0).unwrap(), 42);
        assert_eq!(int(&e, "missing", 7).unwrap(), 7);
        assert!(matches!(real(&e, "c", 0.0), Err(DocumentCorrupt::MalformedNumber { .. })));
        assert!(int(&e, "a", 0).is_err());
        assert_eq!(unsigned(&e, "d", 3).unwrap(), 3);
        assert_eq!(flags(&e, "d", 0).unwrap(), u32::MAX);
    }

    #[test]
    fn test_angle_heuristic() {
        assert_relative_eq!(angle(1.2), 1.2);
        assert_relative_eq!(angle(90.0), constants::HALF_PI, epsilon = 1e-6);
        assert_relative_eq!(angle(constants::PI), constants::PI);
        assert_relative_eq!(angle(-90.0), -90.0);
    }

    #[test]
    fn test_vector_requires_all_axes() {
        assert_relative_eq!(vector3(&el(&[("x", "1"), ("y", "2"), ("z", "3")])).unwrap(), Vec3::new(1.0, 2.0, 3.0));
        let err = vector3(&el(&[("x", "1"), ("y", "2")])).unwrap_err();
        assert!(matches!(err, DocumentCorrupt::MissingAttribute { attribute, .. } if attribute == "z"));
    }

    #[test]
    fn test_colour_alpha_default() {
        let c = colour(&el(&[("r", "0.5"), ("g", "0.25"), ("b", "1")])).unwrap();
        assert_relative_eq!(c.a, 1.0);
        assert!(colour(&el(&[("r", "1"), ("g", "1")])).is_err());
    }

    #[test]
    fn test_plane_and_rect_defaults() {
        let p = plane(&el(&[("y", "1"), ("d", "5")])).unwrap();
        assert_relative_eq!(p.normal, Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(p.d, 5.0);
        let r = float_rect(&el(&[("right", "1"), ("bottom", "0.5")])).unwrap();
        assert_eq!(r, FloatRect::new(0.0, 0.0, 1.0, 0.5));
    }

    #[test]
    fn test_quaternion_encodings() {
        let expected = Quat::from_axis_angle(&Vec3::y_axis(), constants::HALF_PI);
        let (s, c) = (constants::HALF_PI * 0.5).sin_cos();
        let sin = s.to_string();
        let cos = c.to_string();

        let explicit = quaternion(&el(&[("qw", cos.as_str()), ("qx", "0"), ("qy", sin.as_str()), ("qz", "0")])).unwrap();
        assert_relative_eq!(explicit.angle_to(&expected), 0.0, epsilon = 1e-4);

        let axis_degrees = quaternion(&el(&[("axisX", "0"), ("axisY", "1"), ("axisZ", "0"), ("angle", "90")])).unwrap();
        assert_relative_eq!(axis_degrees.angle_to(&expected), 0.0, epsilon = 1e-4);

        let half_pi = constants::HALF_PI.to_string();
        let euler = quaternion(&el(&[("angleX", "0"), ("angleY", half_pi.as_str()), ("angleZ", "0"), ("order", "yxz")])).unwrap();
        assert_relative_eq!(euler.angle_to(&expected), 0.0, epsilon = 1e-4);

        let bare = quaternion(&el(&[("x", "0"), ("y", sin.as_str()), ("z", "0"), ("w", cos.as_str())])).unwrap();
        assert_relative_eq!(bare.angle_to(&expected), 0.0, epsilon = 1e-4);

        assert_eq!(quaternion(&el(&[])).unwrap(), Quat::identity());
    }

    #[test]
    fn test_quaternion_priority() {
        // qw wins over the bare encoding on the same element
        let q = quaternion(&el(&[("qw", "1"), ("qx", "0"), ("qy", "0"), ("qz", "0"), ("x", "1"), ("y", "0"), ("z", "0"), ("w", "0")])).unwrap();
        assert_relative_eq!(q.angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_order_selection() {
        assert_eq!(euler_order("x"), EulerOrder::Xyz);
        assert_eq!(euler_order(""), EulerOrder::Xyz);
        assert_eq!(euler_order("xy"), EulerOrder::Xyz);
        assert_eq!(euler_order("xz"), EulerOrder::Xzy);
        assert_eq!(euler_order("yx"), EulerOrder::Yxz);
        assert_eq!(euler_order("yz"), EulerOrder::Yzx);
        assert_eq!(euler_order("zx"), EulerOrder::Zxy);
        assert_eq!(euler_order("zy"), EulerOrder::Zyx);
    }

    #[test]
    fn test_enum_tables() {
        assert_eq!(render_queue("Overlay"), render_queue::OVERLAY);
        assert_eq!(render_queue("unknown"), render_queue::MAIN);
        assert_eq!(pixel_format("a8r8g8b8"), PixelFormat::A8R8G8B8);
        assert_eq!(pixel_format("nonsense"), PixelFormat::FLOAT16_R);
        assert_eq!(texture_type("CUBIC"), TextureType::CubeMap);
        assert_eq!(texture_type("other"), TextureType::TwoD);
    }

    #[test]
    fn test_flag_list() {
        let e = Element::new("queryFlags")
            .with_child(Element::new("queryFlag").with_attribute("bit", "1"))
            .with_child(Element::new("queryFlag").with_attribute("bit", "4"))
            .with_child(Element::new("other").with_attribute("bit", "8"));
        assert_eq!(flag_list(&e, "queryFlag").unwrap(), 5);
    }
}
