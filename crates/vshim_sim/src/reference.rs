//! Built-in behavioral reference models.
//!
//! These stand in for a compiled design when exercising the session
//! contract without an external simulator. Outputs only change on
//! [`SimModel::eval`], exactly like a compiled model: writing an input and
//! reading an output without an intervening `eval` returns the old output.

use vshim_common::{PortId, PortSpec, PortValue};

use crate::error::SimError;
use crate::model::SimModel;

/// Names accepted by [`by_name`].
pub const REFERENCE_MODELS: &[&str] = &["passthrough", "full_adder", "adder", "counter"];

/// Instantiates a reference model by name.
///
/// `width` parameterizes `passthrough`, `adder`, and `counter`; it is
/// ignored by `full_adder`. Widths are clamped to 1..=64.
pub fn by_name(name: &str, width: u32) -> Result<Box<dyn SimModel + Send>, SimError> {
    let width = width.clamp(1, 64);
    match name {
        "passthrough" | "pass_through" => Ok(Box::new(PassThrough::new(width))),
        "full_adder" => Ok(Box::new(FullAdder::new())),
        "adder" => Ok(Box::new(Adder::new(width))),
        "counter" => Ok(Box::new(Counter::new(width))),
        _ => Err(SimError::UnknownReferenceModel(name.to_string())),
    }
}

/// Port storage shared by the reference models.
#[derive(Clone, Debug)]
struct PortBank {
    specs: Vec<PortSpec>,
    values: Vec<PortValue>,
}

impl PortBank {
    fn new(specs: Vec<PortSpec>) -> Self {
        let values = specs.iter().map(|s| PortValue::new(s.width)).collect();
        Self { specs, values }
    }

    fn get(&self, index: usize) -> u64 {
        self.values[index].low_u64()
    }

    fn set(&mut self, index: usize, value: u64) {
        self.values[index] = PortValue::from_u64(value, self.specs[index].width);
    }

    fn read(&self, id: PortId) -> PortValue {
        self.values[id.index()].clone()
    }

    fn write(&mut self, id: PortId, value: &PortValue) {
        let width = self.specs[id.index()].width;
        self.values[id.index()] = value.resized(width);
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// `out = in_`.
#[derive(Clone, Debug)]
pub struct PassThrough {
    bank: PortBank,
}

impl PassThrough {
    const IN: usize = 0;
    const OUT: usize = 1;

    /// Creates a pass-through of `nbits` bits.
    pub fn new(nbits: u32) -> Self {
        Self {
            bank: PortBank::new(vec![
                PortSpec::input("in_", nbits),
                PortSpec::output("out", nbits),
            ]),
        }
    }
}

impl SimModel for PassThrough {
    fn name(&self) -> &str {
        "PassThrough"
    }

    fn ports(&self) -> &[PortSpec] {
        &self.bank.specs
    }

    fn eval(&mut self) {
        let v = self.bank.get(Self::IN);
        self.bank.set(Self::OUT, v);
    }

    fn finalize(&mut self) {}

    fn read_port(&self, id: PortId) -> PortValue {
        self.bank.read(id)
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        self.bank.write(id, value)
    }
}

/// One-bit full adder: `sum = in0 ^ in1 ^ cin`, `cout = majority(in0, in1, cin)`.
#[derive(Clone, Debug)]
pub struct FullAdder {
    bank: PortBank,
}

impl FullAdder {
    /// Creates a full adder.
    pub fn new() -> Self {
        Self {
            bank: PortBank::new(vec![
                PortSpec::input("in0", 1),
                PortSpec::input("in1", 1),
                PortSpec::input("cin", 1),
                PortSpec::output("sum", 1),
                PortSpec::output("cout", 1),
            ]),
        }
    }
}

impl Default for FullAdder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimModel for FullAdder {
    fn name(&self) -> &str {
        "FullAdder"
    }

    fn ports(&self) -> &[PortSpec] {
        &self.bank.specs
    }

    fn eval(&mut self) {
        let (a, b, c) = (self.bank.get(0), self.bank.get(1), self.bank.get(2));
        self.bank.set(3, a ^ b ^ c);
        self.bank.set(4, (a & b) | (a & c) | (b & c));
    }

    fn finalize(&mut self) {}

    fn read_port(&self, id: PortId) -> PortValue {
        self.bank.read(id)
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        self.bank.write(id, value)
    }
}

/// `sum = (a + b) mod 2^nbits`.
#[derive(Clone, Debug)]
pub struct Adder {
    bank: PortBank,
    nbits: u32,
}

impl Adder {
    /// Creates an adder of `nbits` bits.
    pub fn new(nbits: u32) -> Self {
        Self {
            bank: PortBank::new(vec![
                PortSpec::input("a", nbits),
                PortSpec::input("b", nbits),
                PortSpec::output("sum", nbits),
            ]),
            nbits,
        }
    }
}

impl SimModel for Adder {
    fn name(&self) -> &str {
        "Adder"
    }

    fn ports(&self) -> &[PortSpec] {
        &self.bank.specs
    }

    fn eval(&mut self) {
        let sum = self.bank.get(0).wrapping_add(self.bank.get(1)) & mask(self.nbits);
        self.bank.set(2, sum);
    }

    fn finalize(&mut self) {}

    fn read_port(&self, id: PortId) -> PortValue {
        self.bank.read(id)
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        self.bank.write(id, value)
    }
}

/// Counter with synchronous reset: on a rising `clk` edge between two
/// evaluations, `count` becomes 0 if `reset` is high, else `count + 1`.
#[derive(Clone, Debug)]
pub struct Counter {
    bank: PortBank,
    nbits: u32,
    prev_clk: bool,
}

impl Counter {
    const CLK: usize = 0;
    const RESET: usize = 1;
    const COUNT: usize = 2;

    /// Creates a counter of `nbits` bits.
    pub fn new(nbits: u32) -> Self {
        Self {
            bank: PortBank::new(vec![
                PortSpec::input("clk", 1),
                PortSpec::input("reset", 1),
                PortSpec::output("count", nbits),
            ]),
            nbits,
            prev_clk: false,
        }
    }
}

impl SimModel for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn ports(&self) -> &[PortSpec] {
        &self.bank.specs
    }

    fn eval(&mut self) {
        let clk = self.bank.get(Self::CLK) != 0;
        if clk && !self.prev_clk {
            let next = if self.bank.get(Self::RESET) != 0 {
                0
            } else {
                self.bank.get(Self::COUNT).wrapping_add(1) & mask(self.nbits)
            };
            self.bank.set(Self::COUNT, next);
        }
        self.prev_clk = clk;
    }

    fn finalize(&mut self) {}

    fn read_port(&self, id: PortId) -> PortValue {
        self.bank.read(id)
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        self.bank.write(id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(m: &mut dyn SimModel, index: u32, value: u64) {
        let width = m.ports()[index as usize].width;
        m.write_port(PortId::from_raw(index), &PortValue::from_u64(value, width));
    }

    fn get(m: &dyn SimModel, index: u32) -> u64 {
        m.read_port(PortId::from_raw(index)).low_u64()
    }

    #[test]
    fn passthrough_holds_until_eval() {
        let mut m = PassThrough::new(16);
        set(&mut m, 0, 8);
        m.eval();
        assert_eq!(get(&m, 1), 8);
        set(&mut m, 0, 9);
        set(&mut m, 0, 10);
        assert_eq!(get(&m, 1), 8);
        m.eval();
        assert_eq!(get(&m, 1), 10);
    }

    #[test]
    fn full_adder_truth_table() {
        let mut m = FullAdder::new();
        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    set(&mut m, 0, x);
                    set(&mut m, 1, y);
                    set(&mut m, 2, z);
                    m.eval();
                    assert_eq!(get(&m, 3), x ^ y ^ z);
                    assert_eq!(get(&m, 4), (x & y) | (x & z) | (y & z));
                }
            }
        }
    }

    #[test]
    fn adder_wraps() {
        let mut m = Adder::new(4);
        set(&mut m, 0, 2);
        set(&mut m, 1, 2);
        m.eval();
        assert_eq!(get(&m, 2), 4);
        set(&mut m, 0, 11);
        set(&mut m, 1, 4);
        m.eval();
        assert_eq!(get(&m, 2), 15);
        set(&mut m, 0, 5);
        set(&mut m, 1, 12);
        assert_eq!(get(&m, 2), 15);
        m.eval();
        assert_eq!(get(&m, 2), 1);
    }

    #[test]
    fn adder_full_width() {
        let mut m = Adder::new(64);
        set(&mut m, 0, u64::MAX);
        set(&mut m, 1, 2);
        m.eval();
        assert_eq!(get(&m, 2), 1);
    }

    #[test]
    fn counter_counts_rising_edges() {
        let mut m = Counter::new(4);
        for cycle in 0..6u64 {
            set(&mut m, 0, cycle % 2);
            m.eval();
        }
        // rising edges at cycles 1, 3, 5
        assert_eq!(get(&m, 2), 3);
    }

    #[test]
    fn counter_level_high_is_one_edge() {
        let mut m = Counter::new(4);
        set(&mut m, 0, 1);
        m.eval();
        m.eval();
        m.eval();
        assert_eq!(get(&m, 2), 1);
    }

    #[test]
    fn counter_synchronous_reset() {
        let mut m = Counter::new(4);
        for cycle in 0..4u64 {
            set(&mut m, 0, cycle % 2);
            m.eval();
        }
        assert_eq!(get(&m, 2), 2);
        set(&mut m, 1, 1);
        // reset alone does nothing until the next rising edge
        m.eval();
        assert_eq!(get(&m, 2), 2);
        set(&mut m, 0, 0);
        m.eval();
        set(&mut m, 0, 1);
        m.eval();
        assert_eq!(get(&m, 2), 0);
    }

    #[test]
    fn counter_wraps_at_width() {
        let mut m = Counter::new(2);
        for cycle in 0..10u64 {
            set(&mut m, 0, cycle % 2);
            m.eval();
        }
        // 5 rising edges mod 4
        assert_eq!(get(&m, 2), 1);
    }

    #[test]
    fn by_name_known_and_unknown() {
        for name in REFERENCE_MODELS {
            assert!(by_name(name, 8).is_ok(), "{name} should exist");
        }
        let m = by_name("adder", 8).unwrap();
        assert_eq!(m.name(), "Adder");
        assert_eq!(m.ports()[0].width, 8);
        assert!(matches!(
            by_name("alu", 8),
            Err(SimError::UnknownReferenceModel(_))
        ));
    }

    #[test]
    fn by_name_clamps_width() {
        let m = by_name("passthrough", 0).unwrap();
        assert_eq!(m.ports()[0].width, 1);
        let m = by_name("counter", 200).unwrap();
        assert_eq!(m.ports()[2].width, 64);
    }
}
