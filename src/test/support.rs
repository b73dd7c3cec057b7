//! Test helpers: a probe node that records every frame it receives.

use crate::net::{Addr, Frame, Network};
use crate::node::Node;
use crate::sim::{SimTime, Simulator};
use std::any::Any;

pub struct Sink {
    addr: Addr,
    name: String,
    pub received: Vec<(SimTime, Frame)>,
}

impl Sink {
    pub fn new(addr: Addr) -> Sink {
        Sink {
            addr,
            name: format!("sink{}", addr.0),
            received: Vec::new(),
        }
    }
}

impl Node for Sink {
    fn addr(&self) -> Addr {
        self.addr
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        _arrival_gate: usize,
        sim: &mut Simulator,
        _net: &mut Network,
    ) {
        self.received.push((sim.now(), frame));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
