// chain.rs — Tag-pipelined operator instance chain
//
// Holds the operator instances of one design unit in program order and
// renders their VHDL instantiations. Every instance is wired to its
// neighbours through the tag signal: instance i reads the tag that instance
// i-1 drives and drives the tag that instance i+1 reads. The first instance
// reads the unit's `tag_in` port and the last one drives `tag_out`.
//
// Neighbour relations are derived from the index on every query, never
// stored, so they cannot go stale.
//
// Rerouting an earlier instance to the return port leaves later instances
// reading `return_value`, an `out` port. Reading an out port is legal only
// in VHDL-2008, so output of such functions needs a 2008-mode toolchain.
//
// Preconditions: none.
// Postconditions: render order equals append order.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write as _;

use crate::ir::BinOp;

/// Port signal carrying the tag into the first stage.
pub const TAG_IN: &str = "tag_in";
/// Port signal carrying the tag out of the last stage.
pub const TAG_OUT: &str = "tag_out";
/// Port signal driven by the stage whose result the function returns.
pub const RETURN_VALUE: &str = "return_value";
/// Operator library used when none is configured.
pub const DEFAULT_LIBRARY: &str = "work";

/// One operator placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInstance {
    pub operation: BinOp,
    pub input_a: String,
    pub input_b: String,
    pub output: String,
    /// Bit width of the result, for the intermediate signal declaration.
    pub width: u32,
}

impl PipelineInstance {
    pub fn new(
        operation: BinOp,
        input_a: impl Into<String>,
        input_b: impl Into<String>,
        output: impl Into<String>,
        width: u32,
    ) -> Self {
        Self {
            operation,
            input_a: input_a.into(),
            input_b: input_b.into(),
            output: output.into(),
            width,
        }
    }

    pub fn drives_return_value(&self) -> bool {
        self.output == RETURN_VALUE
    }
}

/// Append-only sequence of pipeline instances.
#[derive(Debug, Clone, Default)]
pub struct InstanceChain {
    library: Option<String>,
    instances: Vec<PipelineInstance>,
}

impl InstanceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library that qualifies every operator entity (`work` if unset).
    pub fn library(&self) -> &str {
        match &self.library {
            Some(lib) if !lib.is_empty() => lib,
            _ => DEFAULT_LIBRARY,
        }
    }

    pub fn set_library(&mut self, library: impl Into<String>) {
        self.library = Some(library.into());
    }

    /// Append an instance and return its index.
    pub fn append(&mut self, instance: PipelineInstance) -> usize {
        let index = self.instances.len();
        self.instances.push(instance);
        index
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PipelineInstance> {
        self.instances.get(index)
    }

    pub fn instances(&self) -> &[PipelineInstance] {
        &self.instances
    }

    /// Redirect the output of an already appended instance to the return
    /// signal. Inputs that read the old signal follow it. Returns `false`
    /// if the index is out of range.
    pub fn route_to_return(&mut self, index: usize) -> bool {
        let Some(instance) = self.instances.get_mut(index) else {
            return false;
        };
        let old = std::mem::replace(&mut instance.output, RETURN_VALUE.to_string());
        for inst in &mut self.instances {
            if inst.input_a == old {
                inst.input_a = RETURN_VALUE.to_string();
            }
            if inst.input_b == old {
                inst.input_b = RETURN_VALUE.to_string();
            }
        }
        true
    }

    // ── Position-derived names ──

    /// `inst_<index>_<operation>`
    pub fn instance_name(&self, index: usize) -> String {
        format!("inst_{}_{}", index, self.instances[index].operation.opcode())
    }

    /// Internal tag wire driven by instance `index`.
    fn tag_wire(&self, index: usize) -> String {
        format!("{}_tag_out", self.instance_name(index))
    }

    /// Tag signal instance `index` reads.
    pub fn tag_input_name(&self, index: usize) -> String {
        if index == 0 {
            TAG_IN.to_string()
        } else {
            self.tag_output_name(index - 1)
        }
    }

    /// Tag signal instance `index` drives.
    pub fn tag_output_name(&self, index: usize) -> String {
        if index + 1 >= self.instances.len() {
            TAG_OUT.to_string()
        } else {
            self.tag_wire(index)
        }
    }

    // ── Rendering ──

    /// Architecture-body instantiations, one clause per line, followed by a
    /// blank line.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        let library = self.library();
        for (index, inst) in self.instances.iter().enumerate() {
            let op = inst.operation.opcode();
            let _ = writeln!(
                buf,
                "{}: entity {}.{} is port map (clk => clk, sreset => sreset, tag_in => {}, a => {}, b => {}, tag_out => {}, q => {});",
                self.instance_name(index),
                library,
                op,
                self.tag_input_name(index),
                inst.input_a,
                inst.input_b,
                self.tag_output_name(index),
                inst.output,
            );
        }
        buf.push('\n');
        buf
    }

    /// Signal declarations for the wires between instances: each data output
    /// that is not the return port, and each internal tag wire.
    pub fn render_declarations(&self) -> String {
        let mut buf = String::new();
        for (index, inst) in self.instances.iter().enumerate() {
            if !inst.drives_return_value() {
                let _ = writeln!(
                    buf,
                    "signal {} : std_ulogic_vector(0 to {} - 1);",
                    inst.output, inst.width
                );
            }
            if index + 1 < self.instances.len() {
                let _ = writeln!(
                    buf,
                    "signal {} : std_ulogic_vector(0 to tag_width - 1);",
                    self.tag_wire(index)
                );
            }
        }
        buf
    }
}
