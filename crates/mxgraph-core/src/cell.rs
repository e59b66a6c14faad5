use crate::error::{ParseError, ParseResult, StoreResult};
use crate::geometry::{GEOMETRY_TAG, Geometry};
use crate::store::CellStore;
use crate::style::Style;
use crate::xml::{Attributes, Element};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const CELL_TAG: &str = "mxCell";

/// Style and geometry shared by vertices and edges.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default)]
    pub style: Style,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connector {
    #[serde(flatten)]
    pub shape: Shape,

    /// Raw id of the source cell; `None` when the end is a free point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CellKind {
    /// Structural cell (the implicit root and layers) without style or geometry.
    Group,
    Vertex(Shape),
    Edge(Connector),
}

/// `<UserObject>` / `<object>` element wrapping a cell. It owns the cell id
/// on disk and carries custom properties such as `label` or `link`.
///
/// `attrs` holds the wrapper attributes in document order, `id` included; the
/// cell's own id replaces that value on write without moving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserObject {
    pub tag: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,
}

/// A node of the diagram tree.
///
/// Cells never point at each other: `parent`, `source` and `target` are ids
/// resolved through the owning [`CellStore`] when read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<String>,

    /// Attributes not modeled elsewhere (`value`, `connectable`, ...), in
    /// document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,

    #[serde(flatten)]
    pub kind: CellKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_object: Option<UserObject>,
}

impl Cell {
    fn with_kind(id: impl Into<String>, kind: CellKind) -> Self {
        Self {
            id: id.into(),
            parent: None,
            attrs: Attributes::new(),
            kind,
            user_object: None,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::with_kind(id, CellKind::Group)
    }

    pub fn vertex(id: impl Into<String>, style: Style, geometry: Option<Geometry>) -> Self {
        Self::with_kind(id, CellKind::Vertex(Shape { style, geometry }))
    }

    pub fn edge(
        id: impl Into<String>,
        source: Option<&str>,
        target: Option<&str>,
        style: Style,
        geometry: Option<Geometry>,
    ) -> Self {
        Self::with_kind(
            id,
            CellKind::Edge(Connector {
                shape: Shape { style, geometry },
                source: source.map(str::to_string),
                target: target.map(str::to_string),
            }),
        )
    }

    pub fn with_parent(mut self, parent: Option<&str>) -> Self {
        self.set_parent(parent);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_parent(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_string);
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, CellKind::Group)
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, CellKind::Vertex(_))
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, CellKind::Edge(_))
    }

    /// Label text: the `value` attribute, or the wrapper's `label`.
    pub fn value(&self) -> Option<&str> {
        self.attrs.get("value").map(String::as_str).or_else(|| {
            self.user_object
                .as_ref()
                .and_then(|u| u.attrs.get("label"))
                .map(String::as_str)
        })
    }

    fn shape(&self) -> Option<&Shape> {
        match &self.kind {
            CellKind::Group => None,
            CellKind::Vertex(shape) => Some(shape),
            CellKind::Edge(conn) => Some(&conn.shape),
        }
    }

    fn shape_mut(&mut self) -> Option<&mut Shape> {
        match &mut self.kind {
            CellKind::Group => None,
            CellKind::Vertex(shape) => Some(shape),
            CellKind::Edge(conn) => Some(&mut conn.shape),
        }
    }

    /// `None` for groups.
    pub fn style(&self) -> Option<&Style> {
        self.shape().map(|s| &s.style)
    }

    pub fn style_mut(&mut self) -> Option<&mut Style> {
        self.shape_mut().map(|s| &mut s.style)
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.shape().and_then(|s| s.geometry.as_ref())
    }

    /// Returns the geometry back when the cell is a group.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<(), Geometry> {
        match self.shape_mut() {
            Some(shape) => {
                shape.geometry = Some(geometry);
                Ok(())
            }
            None => Err(geometry),
        }
    }

    pub fn connector(&self) -> Option<&Connector> {
        match &self.kind {
            CellKind::Edge(conn) => Some(conn),
            _ => None,
        }
    }

    pub fn connector_mut(&mut self) -> Option<&mut Connector> {
        match &mut self.kind {
            CellKind::Edge(conn) => Some(conn),
            _ => None,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        self.connector().and_then(|c| c.source.as_deref())
    }

    pub fn target_id(&self) -> Option<&str> {
        self.connector().and_then(|c| c.target.as_deref())
    }

    /// Reads one child of `<root>`: a bare `<mxCell>` or a `UserObject` /
    /// `object` wrapper around one. References are kept as raw ids.
    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        if is_user_object(&element.name) {
            return Self::from_user_object_xml(element);
        }
        if element.name != CELL_TAG {
            return Err(ParseError::Structure(format!(
                "expected <{CELL_TAG}>, found <{}>",
                element.name
            )));
        }
        let id = element
            .attr("id")
            .ok_or(ParseError::MissingAttr("mxCell@id"))?;
        Self::from_cell_xml(id, element)
    }

    fn from_user_object_xml(element: &Element) -> ParseResult<Self> {
        let id = element
            .attr("id")
            .ok_or(ParseError::MissingAttr("UserObject@id"))?;
        let inner = element.child(CELL_TAG).ok_or_else(|| {
            ParseError::Structure(format!("<{}> {id} without <{CELL_TAG}>", element.name))
        })?;

        let mut cell = Self::from_cell_xml(id, inner)?;
        cell.user_object = Some(UserObject {
            tag: element.name.clone(),
            attrs: element.attrs.clone(),
        });
        Ok(cell)
    }

    fn from_cell_xml(id: &str, element: &Element) -> ParseResult<Self> {
        let kind = if element.has_attr("vertex") {
            CellKind::Vertex(read_shape(element)?)
        } else if element.has_attr("edge") {
            CellKind::Edge(Connector {
                shape: read_shape(element)?,
                source: element.attr("source").map(str::to_string),
                target: element.attr("target").map(str::to_string),
            })
        } else {
            if element.child(GEOMETRY_TAG).is_some() {
                tracing::warn!(cell = id, "ignoring geometry on group cell");
            }
            CellKind::Group
        };

        let mut cell = Self::with_kind(id, kind);
        cell.parent = element.attr("parent").map(str::to_string);
        cell.attrs = element
            .attrs
            .iter()
            .filter(|(k, _)| !is_modeled_attr(&cell.kind, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(cell)
    }

    /// Writes the cell, resolving its references through `store`. A
    /// reference the store cannot resolve fails with `CellNotFound`.
    pub fn to_xml(&self, store: &CellStore) -> StoreResult<Element> {
        let parent = store.parent_of(self)?.map(Cell::id);

        let mut el = Element::new(CELL_TAG);
        if self.user_object.is_none() {
            el.set_attr("id", self.id.as_str());
        }
        for (k, v) in &self.attrs {
            el.set_attr(k.as_str(), v.as_str());
        }

        match &self.kind {
            CellKind::Group => {
                if let Some(parent) = parent {
                    el.set_attr("parent", parent);
                }
            }
            CellKind::Vertex(shape) => {
                write_style(&mut el, &shape.style);
                el.set_attr("vertex", "1");
                if let Some(parent) = parent {
                    el.set_attr("parent", parent);
                }
                write_geometry(&mut el, shape);
            }
            CellKind::Edge(conn) => {
                write_style(&mut el, &conn.shape.style);
                el.set_attr("edge", "1");
                if let Some(parent) = parent {
                    el.set_attr("parent", parent);
                }
                if let Some(source) = store.source_of(self)? {
                    el.set_attr("source", source.id());
                }
                if let Some(target) = store.target_of(self)? {
                    el.set_attr("target", target.id());
                }
                write_geometry(&mut el, &conn.shape);
            }
        }

        Ok(match &self.user_object {
            Some(wrapper) => {
                let mut outer = Element::new(wrapper.tag.as_str());
                for (k, v) in &wrapper.attrs {
                    outer.set_attr(k.as_str(), v.as_str());
                }
                // keeps the position of an `id` read from the file
                outer.with_attr("id", self.id.as_str()).with_child(el)
            }
            None => el,
        })
    }
}

fn read_shape(element: &Element) -> ParseResult<Shape> {
    Ok(Shape {
        style: Style::parse(element.attr("style").unwrap_or("")),
        geometry: element
            .child(GEOMETRY_TAG)
            .map(Geometry::from_xml)
            .transpose()?,
    })
}

fn write_style(el: &mut Element, style: &Style) {
    if !style.is_empty() {
        el.set_attr("style", style.to_string());
    }
}

fn write_geometry(el: &mut Element, shape: &Shape) {
    if let Some(geometry) = &shape.geometry {
        el.children.push(geometry.to_xml());
    }
}

pub(crate) fn is_user_object(name: &str) -> bool {
    name.eq_ignore_ascii_case("userObject") || name == "object"
}

fn is_modeled_attr(kind: &CellKind, k: &str) -> bool {
    match kind {
        CellKind::Group => matches!(k, "id" | "parent"),
        CellKind::Vertex(_) => matches!(k, "id" | "parent" | "style" | "vertex"),
        CellKind::Edge(_) => {
            matches!(k, "id" | "parent" | "style" | "edge" | "source" | "target")
        }
    }
}
