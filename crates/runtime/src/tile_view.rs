//! Live tile render state.

use foundation::TileCoord;

use crate::host::{ImageHandle, TileElem, TileHost};

/// Style snapshot applied to a tile element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileStyle {
    pub tx: f64,
    pub ty: f64,
    pub scale: f64,
    pub opacity: f64,
    pub z: i32,
}

/// A tile currently in the layer stack. Owned exclusively by the
/// orchestrator; the scheduler only ever sees the coordinate.
#[derive(Debug)]
pub struct TileView {
    pub coord: TileCoord,
    pub elem: TileElem,
    pub loaded: bool,
    pub image: Option<ImageHandle>,
    cached: Option<TileStyle>,
}

impl TileView {
    pub fn new(coord: TileCoord, elem: TileElem) -> Self {
        Self {
            coord,
            elem,
            loaded: false,
            image: None,
            cached: None,
        }
    }

    /// Push `style` to the host, touching only the fields that changed since
    /// the last application.
    pub fn apply_style(&mut self, host: &mut dyn TileHost, style: TileStyle) {
        let transform_changed = self.cached.map_or(true, |c| {
            c.tx != style.tx || c.ty != style.ty || c.scale != style.scale
        });
        let opacity_changed = self.cached.map_or(true, |c| c.opacity != style.opacity);
        let z_changed = self.cached.map_or(true, |c| c.z != style.z);

        if transform_changed {
            host.set_transform(self.elem, style.tx, style.ty, style.scale);
        }
        if opacity_changed {
            host.set_opacity(self.elem, style.opacity);
        }
        if z_changed {
            host.set_z(self.elem, style.z);
        }
        self.cached = Some(style);
    }
}

#[cfg(test)]
mod tests {
    use super::{TileStyle, TileView};
    use crate::host::{HeadlessHost, HostOp, TileHost};
    use foundation::TileCoord;
    use num_bigint::BigUint;

    #[test]
    fn style_application_elides_unchanged_fields() {
        let mut host = HeadlessHost::new(800.0, 600.0);
        let coord = TileCoord::new(2, BigUint::from(1u8), BigUint::from(1u8));
        let elem = host.create_tile(&coord);
        let mut view = TileView::new(coord, elem);

        let style = TileStyle {
            tx: 100.0,
            ty: 50.0,
            scale: 1.001,
            opacity: 1.0,
            z: 2,
        };
        view.apply_style(&mut host, style);
        host.clear_ops();

        // Same style: no host traffic at all.
        view.apply_style(&mut host, style);
        assert!(host.ops.is_empty());

        // Opacity-only change touches only opacity.
        view.apply_style(
            &mut host,
            TileStyle {
                opacity: 0.5,
                ..style
            },
        );
        assert_eq!(host.ops, vec![HostOp::Opacity(elem, 0.5)]);
    }
}
