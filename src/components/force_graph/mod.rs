//! Canvas connections graph: data model, layout, camera, painting and the
//! click-to-expand controller, wired together by [`ConnectionsGraph`].

mod camera;
mod component;
mod config;
mod expansion;
mod focus;
mod images;
mod layout;
mod render;
mod state;
mod types;

pub use component::ConnectionsGraph;
pub use config::GraphConfig;
pub(crate) use types::de_opt_id;
pub use types::{ConnectionsPayload, GraphData, GraphLink, GraphNode, GraphRoot, NodeType};
