use crate::error::{ParseError, ParseResult};
use crate::xml::{Attributes, Element};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const GEOMETRY_TAG: &str = "mxGeometry";
pub const POINT_TAG: &str = "mxPoint";
const ARRAY_TAG: &str = "Array";

/// A coordinate pair as written in `<mxPoint>`. draw.io drops a coordinate
/// that equals zero, so both halves are optional and absence round-trips as
/// absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        Ok(Self {
            x: parse_i64_opt(element.attr("x"), "mxPoint@x")?,
            y: parse_i64_opt(element.attr("y"), "mxPoint@y")?,
        })
    }

    pub fn to_xml(&self, as_attr: Option<&str>) -> Element {
        let mut el = Element::new(POINT_TAG);
        if let Some(x) = self.x {
            el.set_attr("x", x.to_string());
        }
        if let Some(y) = self.y {
            el.set_attr("y", y.to_string());
        }
        if let Some(as_attr) = as_attr {
            el.set_attr("as", as_attr);
        }
        el
    }
}

impl From<(i64, i64)> for Point {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

/// Bounding box of a vertex. All four fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexGeometry {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: Attributes,

    /// Child elements such as `<mxRectangle as="alternateBounds">` or a label
    /// `<mxPoint as="offset">`, kept in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_children: Vec<Element>,
}

impl VertexGeometry {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            extra: Attributes::new(),
            extra_children: Vec::new(),
        }
    }

    /// Missing or non-integer box attributes are errors; nothing is defaulted.
    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        Ok(Self {
            x: parse_i64_req(element.attr("x"), "mxGeometry@x")?,
            y: parse_i64_req(element.attr("y"), "mxGeometry@y")?,
            width: parse_i64_req(element.attr("width"), "mxGeometry@width")?,
            height: parse_i64_req(element.attr("height"), "mxGeometry@height")?,
            extra: extra_attrs(element, is_known_vertex_geometry_attr),
            extra_children: element.children.clone(),
        })
    }

    pub fn to_xml(&self) -> Element {
        let mut el = Element::new(GEOMETRY_TAG)
            .with_attr("x", self.x.to_string())
            .with_attr("y", self.y.to_string())
            .with_attr("width", self.width.to_string())
            .with_attr("height", self.height.to_string());
        for (k, v) in &self.extra {
            el.set_attr(k.as_str(), v.as_str());
        }
        el.children = self.extra_children.clone();
        el.with_attr("as", "geometry")
    }
}

/// Route of an edge.
///
/// `width`/`height` are only a fallback box for edges that are not laid out
/// relative to connected cells. `source_point`/`target_point` override an
/// endpoint that is not attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeGeometry {
    #[serde(default)]
    pub relative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_point: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_point: Option<Point>,

    /// Label offset (`<mxPoint as="offset">`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Point>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: Attributes,

    /// Children other than the endpoint, offset and waypoint elements, in
    /// document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_children: Vec<Element>,
}

impl EdgeGeometry {
    /// Relative geometry routed through `points`, the shape draw.io gives a
    /// freshly connected edge.
    pub fn relative(points: impl IntoIterator<Item = Point>) -> Self {
        Self {
            relative: true,
            points: points.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        let mut geom = Self {
            relative: is_true(element.attr("relative")),
            width: parse_i64_opt(element.attr("width"), "mxGeometry@width")?,
            height: parse_i64_opt(element.attr("height"), "mxGeometry@height")?,
            extra: extra_attrs(element, is_known_edge_geometry_attr),
            ..Self::default()
        };

        for child in &element.children {
            match child.name.as_str() {
                POINT_TAG => match child.attr("as") {
                    Some("sourcePoint") => geom.source_point = Some(Point::from_xml(child)?),
                    Some("targetPoint") => geom.target_point = Some(Point::from_xml(child)?),
                    Some("offset") => geom.offset = Some(Point::from_xml(child)?),
                    _ => geom.extra_children.push(child.clone()),
                },
                ARRAY_TAG if child.attr("as") == Some("points") => {
                    for point in child.children_named(POINT_TAG) {
                        geom.points.push(Point::from_xml(point)?);
                    }
                }
                _ => geom.extra_children.push(child.clone()),
            }
        }
        Ok(geom)
    }

    pub fn to_xml(&self) -> Element {
        let mut el = Element::new(GEOMETRY_TAG);
        if let Some(width) = self.width {
            el.set_attr("width", width.to_string());
        }
        if let Some(height) = self.height {
            el.set_attr("height", height.to_string());
        }
        for (k, v) in &self.extra {
            el.set_attr(k.as_str(), v.as_str());
        }
        if self.relative {
            el.set_attr("relative", "1");
        }
        el.set_attr("as", "geometry");

        if let Some(p) = &self.source_point {
            el.children.push(p.to_xml(Some("sourcePoint")));
        }
        if let Some(p) = &self.target_point {
            el.children.push(p.to_xml(Some("targetPoint")));
        }
        if !self.points.is_empty() {
            let mut array = Element::new(ARRAY_TAG).with_attr("as", "points");
            array.children = self.points.iter().map(|p| p.to_xml(None)).collect();
            el.children.push(array);
        }
        if let Some(p) = &self.offset {
            el.children.push(p.to_xml(Some("offset")));
        }
        el.children.extend(self.extra_children.iter().cloned());
        el
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Geometry {
    Vertex(VertexGeometry),
    Edge(EdgeGeometry),
}

impl Geometry {
    /// Classifies by the file format's own convention: a geometry carrying all
    /// of `x`, `y`, `width` and `height` is a vertex box, anything else is an
    /// edge route.
    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        if ["x", "y", "width", "height"]
            .iter()
            .all(|k| element.has_attr(k))
        {
            Ok(Self::Vertex(VertexGeometry::from_xml(element)?))
        } else {
            Ok(Self::Edge(EdgeGeometry::from_xml(element)?))
        }
    }

    pub fn to_xml(&self) -> Element {
        match self {
            Self::Vertex(g) => g.to_xml(),
            Self::Edge(g) => g.to_xml(),
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexGeometry> {
        match self {
            Self::Vertex(g) => Some(g),
            Self::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeGeometry> {
        match self {
            Self::Edge(g) => Some(g),
            Self::Vertex(_) => None,
        }
    }
}

impl From<VertexGeometry> for Geometry {
    fn from(g: VertexGeometry) -> Self {
        Self::Vertex(g)
    }
}

impl From<EdgeGeometry> for Geometry {
    fn from(g: EdgeGeometry) -> Self {
        Self::Edge(g)
    }
}

pub(crate) fn is_true(v: Option<&str>) -> bool {
    matches!(v, Some("1" | "true" | "TRUE" | "True"))
}

fn parse_i64_req(v: Option<&str>, field: &'static str) -> ParseResult<i64> {
    let s = v.ok_or(ParseError::MissingAttr(field))?;
    s.trim().parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: s.to_string(),
    })
}

fn parse_i64_opt(v: Option<&str>, field: &'static str) -> ParseResult<Option<i64>> {
    let Some(s) = v else { return Ok(None) };
    if s.trim().is_empty() {
        return Ok(None);
    }
    parse_i64_req(Some(s), field).map(Some)
}

fn extra_attrs(element: &Element, is_known: fn(&str) -> bool) -> Attributes {
    element
        .attrs
        .iter()
        .filter(|(k, _)| !is_known(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_known_vertex_geometry_attr(k: &str) -> bool {
    matches!(k, "x" | "y" | "width" | "height" | "as")
}

fn is_known_edge_geometry_attr(k: &str) -> bool {
    matches!(k, "width" | "height" | "relative" | "as")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(xml: &str) -> Element {
        Element::parse(xml).unwrap()
    }

    #[test]
    fn reads_vertex_box() {
        let geom = Geometry::from_xml(&el(
            r#"<mxGeometry x="700" y="50" width="120" height="60" as="geometry" />"#,
        ))
        .unwrap();
        assert_eq!(geom, Geometry::Vertex(VertexGeometry::new(700, 50, 120, 60)));
    }

    #[test]
    fn writes_vertex_box_attributes() {
        let xml = VertexGeometry::new(50, 220, 120, 60).to_xml();
        let attrs: Vec<(&str, &str)> = xml
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            attrs,
            [
                ("x", "50"),
                ("y", "220"),
                ("width", "120"),
                ("height", "60"),
                ("as", "geometry")
            ]
        );
    }

    #[test]
    fn vertex_geometry_requires_all_box_attributes() {
        let err = VertexGeometry::from_xml(&el(r#"<mxGeometry x="1" y="2" width="3" as="geometry"/>"#))
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingAttr("mxGeometry@height")));

        let err = VertexGeometry::from_xml(&el(
            r#"<mxGeometry x="1" y="2" width="wide" height="4" as="geometry"/>"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { field: "mxGeometry@width", .. }));
    }

    #[test]
    fn edge_geometry_keeps_optional_fields_absent() {
        let source = r#"<mxGeometry relative="1" as="geometry"><Array as="points"><mxPoint x="240" y="310"/></Array></mxGeometry>"#;
        let geom = Geometry::from_xml(&el(source)).unwrap();
        let edge = geom.as_edge().expect("edge geometry");

        assert!(edge.relative);
        assert_eq!(edge.points, vec![Point::new(240, 310)]);
        assert_eq!(edge.width, None);
        assert_eq!(edge.height, None);
        assert_eq!(edge.source_point, None);
        assert_eq!(edge.target_point, None);

        let written = geom.to_xml();
        assert!(!written.has_attr("width"));
        assert!(!written.has_attr("height"));
        assert_eq!(written.to_xml_string().unwrap(), source);
    }

    #[test]
    fn edge_geometry_reads_endpoint_overrides() {
        let geom = EdgeGeometry::from_xml(&el(
            r#"<mxGeometry width="50" height="50" relative="1" as="geometry">
                 <mxPoint x="10" y="20" as="sourcePoint"/>
                 <mxPoint x="60" as="targetPoint"/>
                 <mxPoint x="-4" y="8" as="offset"/>
               </mxGeometry>"#,
        ))
        .unwrap();

        assert_eq!(geom.width, Some(50));
        assert_eq!(geom.height, Some(50));
        assert_eq!(geom.source_point, Some(Point::new(10, 20)));
        assert_eq!(geom.target_point, Some(Point { x: Some(60), y: None }));
        assert_eq!(geom.offset, Some(Point::new(-4, 8)));
        assert!(geom.points.is_empty());

        let written = geom.to_xml();
        assert!(written.child("Array").is_none());
        assert_eq!(
            written.to_xml_string().unwrap(),
            r#"<mxGeometry width="50" height="50" relative="1" as="geometry"><mxPoint x="10" y="20" as="sourcePoint"/><mxPoint x="60" as="targetPoint"/><mxPoint x="-4" y="8" as="offset"/></mxGeometry>"#
        );
    }

    #[test]
    fn partial_box_is_classified_as_edge_geometry() {
        // draw.io omits x="0"; the heuristic then reads the box as a route
        let geom = Geometry::from_xml(&el(r#"<mxGeometry y="40" width="120" height="60" as="geometry"/>"#))
            .unwrap();
        let edge = geom.as_edge().unwrap();
        assert_eq!(edge.width, Some(120));
        assert_eq!(edge.extra.get("y").map(String::as_str), Some("40"));
    }

    #[test]
    fn vertex_geometry_keeps_child_elements() {
        let source = r#"<mxGeometry x="10" y="20" width="200" height="100" as="geometry"><mxRectangle x="10" y="20" width="80" height="26" as="alternateBounds"/><mxPoint x="5" y="-3" as="offset"/></mxGeometry>"#;
        let geom = Geometry::from_xml(&el(source)).unwrap();
        let vertex = geom.as_vertex().expect("vertex geometry");

        assert_eq!(vertex.extra_children.len(), 2);
        assert_eq!(vertex.extra_children[0].name, "mxRectangle");
        assert_eq!(vertex.extra_children[0].attr("as"), Some("alternateBounds"));
        assert_eq!(geom.to_xml().to_xml_string().unwrap(), source);
    }

    #[test]
    fn edge_geometry_keeps_unrecognized_children_after_known_ones() {
        let geom = EdgeGeometry::from_xml(&el(
            r#"<mxGeometry relative="1" as="geometry"><mxPoint x="1" y="2" as="controlPoint"/><mxPoint x="3" y="4" as="sourcePoint"/><Array as="hints"><mxPoint x="9"/></Array></mxGeometry>"#,
        ))
        .unwrap();

        assert_eq!(geom.source_point, Some(Point::new(3, 4)));
        assert!(geom.points.is_empty());
        let names: Vec<_> = geom
            .extra_children
            .iter()
            .map(|c| (c.name.as_str(), c.attr("as")))
            .collect();
        assert_eq!(names, [("mxPoint", Some("controlPoint")), ("Array", Some("hints"))]);

        let written = geom.to_xml().to_xml_string().unwrap();
        assert_eq!(
            written,
            r#"<mxGeometry relative="1" as="geometry"><mxPoint x="3" y="4" as="sourcePoint"/><mxPoint x="1" y="2" as="controlPoint"/><Array as="hints"><mxPoint x="9"/></Array></mxGeometry>"#
        );
        assert_eq!(EdgeGeometry::from_xml(&el(&written)).unwrap(), geom);
    }

    #[test]
    fn empty_edge_geometry_writes_only_marker() {
        let xml = EdgeGeometry::default().to_xml().to_xml_string().unwrap();
        assert_eq!(xml, r#"<mxGeometry as="geometry"/>"#);
    }
}
