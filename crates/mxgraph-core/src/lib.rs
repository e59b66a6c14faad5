pub mod cell;
pub mod codec;
pub mod error;
pub mod file;
pub mod geometry;
pub mod graph;
pub mod store;
pub mod style;
pub mod xml;

pub use cell::{Cell, CellKind, Connector, Shape, UserObject};
pub use codec::{CodecConfig, DiagramCodec};
pub use error::{CodecError, CodecResult, ParseError, ParseResult, StoreError, StoreResult};
pub use file::{Diagram, DiagramContent, MxFile};
pub use geometry::{EdgeGeometry, Geometry, Point, VertexGeometry};
pub use graph::GraphModel;
pub use store::CellStore;
pub use style::Style;
pub use xml::{Attributes, Element};
