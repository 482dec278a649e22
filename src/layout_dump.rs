use crate::layout::Layout;
use crate::tree::Tree;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub orientation: String,
    pub width: f32,
    pub height: f32,
    pub ring_radii: Vec<f32>,
    pub warnings: Vec<String>,
    pub nodes: Vec<NodeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub parent: Option<String>,
    pub order: u32,
    pub side: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub collapsed: bool,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, tree: &Tree) -> Self {
        let nodes = layout
            .positions
            .iter()
            .filter_map(|(id, position)| {
                let node = tree.get(id)?;
                Some(NodeDump {
                    id: id.clone(),
                    parent: node.parent.clone(),
                    order: node.order,
                    side: node.side.map(|side| format!("{side:?}").to_lowercase()),
                    x: position.x,
                    y: position.y,
                    width: node.width,
                    height: node.height,
                    collapsed: node.collapsed,
                })
            })
            .collect();

        LayoutDump {
            orientation: format!("{:?}", layout.orientation),
            width: layout.width,
            height: layout.height,
            ring_radii: layout.ring_radii.clone(),
            warnings: layout
                .warnings
                .iter()
                .map(|warning| warning.to_string())
                .collect(),
            nodes,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout, tree: &Tree) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, tree);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
