//! Canvas pane: nodes, family edges and clan anchors.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  symbols::Marker,
  text::{Line, Span},
  widgets::{
    Block, Borders,
    canvas::{Canvas, Circle, Line as Segment},
  },
};
use vansh_core::layout::EdgeKind;

use crate::app::App;

const PALETTE: [Color; 8] = [
  Color::LightRed,
  Color::LightGreen,
  Color::LightYellow,
  Color::LightBlue,
  Color::LightMagenta,
  Color::LightCyan,
  Color::Rgb(255, 165, 0),
  Color::Rgb(180, 140, 255),
];

/// Stable colour for the clan at `index` in the app's clan list.
fn clan_color(app: &App, clan: &str) -> Color {
  app
    .clans
    .iter()
    .position(|c| c == clan)
    .map(|i| PALETTE[i % PALETTE.len()])
    .unwrap_or(Color::Gray)
}

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  // canvas y grows upwards; layout y grows downwards
  let inner = block.inner(area);
  let width = f64::from(inner.width) * crate::app::CELL_WIDTH;
  let height = f64::from(inner.height) * crate::app::CELL_HEIGHT;
  let highlighted = app.highlighted();

  let canvas = Canvas::default()
    .block(block)
    .marker(Marker::Braille)
    .x_bounds([0.0, width])
    .y_bounds([0.0, height])
    .paint(|ctx| {
      for edge in app.layout.edges() {
        let color = match edge.kind {
          EdgeKind::Father => Color::Gray,
          EdgeKind::Mother => Color::DarkGray,
        };
        ctx.draw(&Segment {
          x1: edge.from.x,
          y1: height - edge.from.y,
          x2: edge.to.x,
          y2: height - edge.to.y,
          color,
        });
      }
      ctx.layer();

      for node in app.layout.nodes() {
        let color = if highlighted.contains(&node.id) {
          Color::White
        } else {
          clan_color(app, &node.clan)
        };
        ctx.draw(&Circle {
          x: node.pos.x,
          y: height - node.pos.y,
          radius: node.radius,
          color,
        });
        if highlighted.contains(&node.id) {
          ctx.print(
            node.pos.x + node.radius,
            height - node.pos.y,
            Span::styled(node.name.clone(), Style::default().fg(Color::White)),
          );
        }
      }
      ctx.layer();

      for (clan, at) in app.layout.anchors() {
        ctx.print(
          at.x,
          height - at.y,
          Line::from(Span::styled(
            clan.to_string(),
            Style::default()
              .fg(clan_color(app, clan))
              .add_modifier(Modifier::BOLD),
          )),
        );
      }
    });

  f.render_widget(canvas, area);
}
