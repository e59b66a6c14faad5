use crate::cell::{CELL_TAG, Cell, is_user_object};
use crate::error::{ParseError, ParseResult, StoreResult};
use crate::store::CellStore;
use crate::xml::{Attributes, Element};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const GRAPH_MODEL_TAG: &str = "mxGraphModel";
const ROOT_TAG: &str = "root";

/// One diagram page: the `<mxGraphModel>` attributes (page size, grid, ...)
/// and the cells under its `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphModel {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: Attributes,

    #[serde(default)]
    pub cells: CellStore,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty model with the two structural cells draw.io always writes: the
    /// root `0` and the default layer `1` under it.
    pub fn with_default_layers() -> Self {
        let mut model = Self::new();
        let root = model.cells.create_group(None).id().to_string();
        model.cells.create_group(Some(&root));
        model
    }

    /// First layer under the root cell, the usual parent for new cells.
    pub fn default_layer(&self) -> Option<&Cell> {
        let root = self.cells.roots().next()?;
        self.cells.children_of(root.id()).next()
    }

    pub fn grid_size(&self) -> Option<i64> {
        self.attr_i64("gridSize")
    }

    pub fn page_size(&self) -> Option<(i64, i64)> {
        Some((self.attr_i64("pageWidth")?, self.attr_i64("pageHeight")?))
    }

    pub fn set_page_size(&mut self, width: i64, height: i64) {
        self.attrs.insert("pageWidth".into(), width.to_string());
        self.attrs.insert("pageHeight".into(), height.to_string());
    }

    fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attrs.get(key)?.trim().parse().ok()
    }

    /// Reads `<mxGraphModel>`. Every child of `<root>` becomes a cell in
    /// document order; parent/source/target stay unresolved ids, so the input
    /// does not have to list a cell before the cells that refer to it.
    pub fn from_xml(element: &Element) -> ParseResult<Self> {
        if element.name != GRAPH_MODEL_TAG {
            return Err(ParseError::Structure(format!(
                "expected <{GRAPH_MODEL_TAG}>, found <{}>",
                element.name
            )));
        }

        let mut model = Self {
            attrs: element.attrs.clone(),
            cells: CellStore::new(),
        };

        let Some(root) = element.child(ROOT_TAG) else {
            tracing::debug!("graph model without <root>");
            return Ok(model);
        };

        for child in &root.children {
            if child.name != CELL_TAG && !is_user_object(&child.name) {
                tracing::warn!(element = %child.name, "skipping unknown element under <root>");
                continue;
            }
            model.cells.add(Cell::from_xml(child)?)?;
        }

        tracing::debug!(cells = model.cells.len(), "graph model read");
        Ok(model)
    }

    /// Writes the model, resolving every reference through the store.
    pub fn to_xml(&self) -> StoreResult<Element> {
        let mut root = Element::new(ROOT_TAG);
        root.children = self
            .cells
            .iter()
            .map(|cell| cell.to_xml(&self.cells))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut el = Element::new(GRAPH_MODEL_TAG);
        el.attrs = self.attrs.clone();
        Ok(el.with_child(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::style::Style;

    const FORWARD_REFS: &str = r#"<mxGraphModel dx="1000" dy="600" grid="1" gridSize="10" pageWidth="827" pageHeight="1169">
  <root>
    <mxCell id="0"/>
    <mxCell id="e" style="edgeStyle=none;html=1;" edge="1" parent="1" source="a" target="b">
      <mxGeometry relative="1" as="geometry"/>
    </mxCell>
    <mxCell id="1" parent="0"/>
    <mxCell id="a" value="A" style="ellipse;html=1;" vertex="1" parent="1">
      <mxGeometry x="10" y="10" width="80" height="40" as="geometry"/>
    </mxCell>
    <mxCell id="b" value="B" style="rounded=1;" vertex="1" parent="1">
      <mxGeometry x="200" y="10" width="80" height="40" as="geometry"/>
    </mxCell>
  </root>
</mxGraphModel>"#;

    #[test]
    fn resolves_references_defined_later_in_the_file() {
        let model = GraphModel::from_xml(&Element::parse(FORWARD_REFS).unwrap()).unwrap();
        let edge = model.cells.get("e").unwrap();

        let source = model.cells.source_of(edge).unwrap().unwrap();
        let target = model.cells.target_of(edge).unwrap().unwrap();
        assert_eq!(source, model.cells.get("a").unwrap());
        assert_eq!(target, model.cells.get("b").unwrap());
        assert_eq!(model.cells.parent_of(edge).unwrap().unwrap().id(), "1");
        assert!(model.cells.validate().is_ok());
    }

    #[test]
    fn keeps_model_attributes_and_cell_order() {
        let model = GraphModel::from_xml(&Element::parse(FORWARD_REFS).unwrap()).unwrap();
        assert_eq!(model.grid_size(), Some(10));
        assert_eq!(model.page_size(), Some((827, 1169)));
        assert_eq!(model.cells.ids().collect::<Vec<_>>(), ["0", "e", "1", "a", "b"]);

        let xml = model.to_xml().unwrap();
        let keys: Vec<&str> = xml.attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, ["dx", "dy", "grid", "gridSize", "pageWidth", "pageHeight"]);
        let written: Vec<&str> = xml
            .child("root")
            .unwrap()
            .children
            .iter()
            .filter_map(|c| c.attr("id"))
            .collect();
        assert_eq!(written, ["0", "e", "1", "a", "b"]);
    }

    #[test]
    fn xml_round_trip_is_stable() {
        let model = GraphModel::from_xml(&Element::parse(FORWARD_REFS).unwrap()).unwrap();
        let first = model.to_xml().unwrap().to_xml_string().unwrap();
        let reread = GraphModel::from_xml(&Element::parse(&first).unwrap()).unwrap();
        assert_eq!(reread, model);
        assert_eq!(reread.to_xml().unwrap().to_xml_string().unwrap(), first);
    }

    #[test]
    fn duplicate_cell_ids_fail_the_model() {
        let xml = r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="0"/></root></mxGraphModel>"#;
        let err = GraphModel::from_xml(&Element::parse(xml).unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::Store(StoreError::DuplicateId(_))));
    }

    #[test]
    fn serializing_with_a_dangling_reference_fails() {
        let xml = r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="2" edge="1" parent="0" source="ghost"/></root></mxGraphModel>"#;
        let model = GraphModel::from_xml(&Element::parse(xml).unwrap()).unwrap();
        assert_eq!(
            model.to_xml().unwrap_err(),
            StoreError::CellNotFound("ghost".into())
        );
    }

    #[test]
    fn builds_a_model_programmatically() {
        let mut model = GraphModel::with_default_layers();
        let layer = model.default_layer().unwrap().id().to_string();
        assert_eq!(layer, "1");

        let a = model
            .cells
            .create_vertex(Some(&layer), Style::parse("ellipse;"), None)
            .id()
            .to_string();
        model
            .cells
            .create_edge(Some(&layer), Some(&a), None, Style::new(), None);
        model.set_page_size(850, 1100);

        let xml = model.to_xml().unwrap().to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<mxGraphModel pageWidth="850" pageHeight="1100"><root><mxCell id="0"/><mxCell id="1" parent="0"/><mxCell id="2" style="ellipse;" vertex="1" parent="1"/><mxCell id="3" edge="1" parent="1" source="2"/></root></mxGraphModel>"#
        );
    }
}
