// vhdl.rs — Design unit builder
//
// Accumulates the interface (generics and ports) and the instance chain of
// one translated function and renders them as a VHDL entity followed by its
// architecture. Storage slots are declared as plain signals ahead of the
// chain's own wires. Generics and ports share one block grammar:
//
//     <keyword> (
//     <entry>;
//     <entry>
//     );
//
// Preconditions: `initialize` has been called (done by `new`).
// Postconditions: `render` is a pure function of the accumulated state.
// Failure modes: none.
// Side effects: none.

use crate::chain::{InstanceChain, PipelineInstance, RETURN_VALUE, TAG_IN, TAG_OUT};

/// Context clause written before every design unit of an output file.
pub const CONTEXT_CLAUSE: &str = "library ieee;\nuse ieee.std_logic_1164.all;\n\n";

/// Generic sizing the tag signal threaded through the chain.
pub const TAG_WIDTH_GENERIC: &str = "tag_width : positive := 1";

/// `<name> : IN std_ulogic_vector(0 to <width> - 1)`
pub fn input_port(name: &str, width: u32) -> String {
    format!("{name} : IN std_ulogic_vector(0 to {width} - 1)")
}

/// Render one `generic (...)` / `port (...)` block.
fn render_block(keyword: &str, entries: &[String]) -> String {
    format!("{keyword} (\n{}\n);\n", entries.join(";\n"))
}

/// Interface and body of one design unit.
#[derive(Debug, Clone)]
pub struct DesignUnit {
    name: String,
    return_width: u32,
    generics: Vec<String>,
    ports: Vec<String>,
    /// Architecture-level signals as `(name, width)`.
    signals: Vec<(String, u32)>,
    chain: InstanceChain,
}

impl DesignUnit {
    pub fn new(name: impl Into<String>, return_width: u32) -> Self {
        let mut unit = Self {
            name: String::new(),
            return_width: 0,
            generics: Vec::new(),
            ports: Vec::new(),
            signals: Vec::new(),
            chain: InstanceChain::new(),
        };
        unit.initialize(name, return_width);
        unit
    }

    /// Reset to the baseline interface: the tag-width generic and the five
    /// fixed ports. The chain's library setting is kept.
    pub fn initialize(&mut self, name: impl Into<String>, return_width: u32) {
        self.name = name.into();
        self.return_width = return_width;
        self.generics = vec![TAG_WIDTH_GENERIC.to_string()];
        self.ports = vec![
            "clk : IN std_ulogic".to_string(),
            "sreset : IN std_ulogic".to_string(),
            format!("{TAG_IN} : in std_ulogic_vector(0 to tag_width - 1) := (others => '0')"),
            format!("{TAG_OUT} : out std_ulogic_vector(0 to tag_width - 1)"),
            format!("{RETURN_VALUE} : out std_ulogic_vector(0 to {return_width} - 1)"),
        ];
        self.signals.clear();
        let library = self.chain.library().to_string();
        self.chain = InstanceChain::new();
        self.chain.set_library(library);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_width(&self) -> u32 {
        self.return_width
    }

    pub fn generics(&self) -> &[String] {
        &self.generics
    }

    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    pub fn signals(&self) -> &[(String, u32)] {
        &self.signals
    }

    pub fn chain(&self) -> &InstanceChain {
        &self.chain
    }

    pub fn set_library(&mut self, library: impl Into<String>) {
        self.chain.set_library(library);
    }

    /// Append one formatted port declaration.
    pub fn add_port(&mut self, declaration: impl Into<String>) {
        self.ports.push(declaration.into());
    }

    /// Declare an architecture signal that no instance drives.
    pub fn add_signal(&mut self, name: impl Into<String>, width: u32) {
        self.signals.push((name.into(), width));
    }

    pub fn add_instance(&mut self, instance: PipelineInstance) -> usize {
        self.chain.append(instance)
    }

    /// Append the instance that produces the function result, driving the
    /// return port.
    pub fn add_return_instance(&mut self, mut instance: PipelineInstance) -> usize {
        instance.output = RETURN_VALUE.to_string();
        self.chain.append(instance)
    }

    /// Point an instance appended earlier at the return port.
    pub fn route_to_return(&mut self, index: usize) -> bool {
        self.chain.route_to_return(index)
    }

    pub fn render(&self) -> String {
        let name = &self.name;
        let mut text = String::new();
        text.push_str(&format!("entity {name} is\n"));
        text.push_str(&render_block("generic", &self.generics));
        text.push_str(&render_block("port", &self.ports));
        text.push_str(&format!("end entity {name};\n"));
        text.push_str(&format!("architecture rtl of {name} is\n"));
        for (signal, width) in &self.signals {
            text.push_str(&format!("signal {signal} : std_ulogic_vector(0 to {width} - 1);\n"));
        }
        text.push_str(&self.chain.render_declarations());
        text.push_str("begin\n");
        text.push_str(&self.chain.render());
        text.push_str(&format!("end architecture {name};\n"));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOp;

    #[test]
    fn fresh_unit_baseline() {
        let unit = DesignUnit::new("f", 32);
        assert_eq!(unit.generics(), &["tag_width : positive := 1".to_string()]);
        let names: Vec<&str> = unit
            .ports()
            .iter()
            .map(|p| p.split(' ').next().unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["clk", "sreset", "tag_in", "tag_out", "return_value"]);
        assert!(unit.chain().is_empty());
    }

    #[test]
    fn fresh_unit_render() {
        let unit = DesignUnit::new("f", 8);
        assert_eq!(
            unit.render(),
            "entity f is\n\
             generic (\n\
             tag_width : positive := 1\n\
             );\n\
             port (\n\
             clk : IN std_ulogic;\n\
             sreset : IN std_ulogic;\n\
             tag_in : in std_ulogic_vector(0 to tag_width - 1) := (others => '0');\n\
             tag_out : out std_ulogic_vector(0 to tag_width - 1);\n\
             return_value : out std_ulogic_vector(0 to 8 - 1)\n\
             );\n\
             end entity f;\n\
             architecture rtl of f is\n\
             begin\n\
             \n\
             end architecture f;\n"
        );
    }

    #[test]
    fn block_has_no_trailing_semicolon() {
        let block = render_block("port", &["a : IN bit".to_string(), "b : IN bit".to_string()]);
        assert_eq!(block, "port (\na : IN bit;\nb : IN bit\n);\n");
    }

    #[test]
    fn ports_follow_fixed_entries() {
        let mut unit = DesignUnit::new("f", 32);
        unit.add_port(input_port("a", 32));
        unit.add_port(input_port("b", 16));
        assert_eq!(unit.ports().len(), 7);
        assert_eq!(unit.ports()[5], "a : IN std_ulogic_vector(0 to 32 - 1)");
        assert_eq!(unit.ports()[6], "b : IN std_ulogic_vector(0 to 16 - 1)");
    }

    #[test]
    fn return_instance_renamed_before_append() {
        let mut unit = DesignUnit::new("f", 32);
        let index = unit.add_return_instance(PipelineInstance::new(BinOp::Add, "a", "b", "s", 32));
        assert_eq!(index, 0);
        assert_eq!(unit.chain().instances()[0].output, "return_value");
    }

    #[test]
    fn initialize_resets_state() {
        let mut unit = DesignUnit::new("f", 32);
        unit.set_library("ops");
        unit.add_port(input_port("a", 32));
        unit.add_signal("slot", 32);
        unit.add_instance(PipelineInstance::new(BinOp::Add, "a", "a", "s", 32));
        unit.initialize("g", 4);
        assert!(unit.signals().is_empty());
        assert_eq!(unit.name(), "g");
        assert_eq!(unit.return_width(), 4);
        assert_eq!(unit.ports().len(), 5);
        assert_eq!(unit.generics().len(), 1);
        assert!(unit.chain().is_empty());
        assert_eq!(unit.chain().library(), "ops");
    }

    #[test]
    fn storage_signals_declared_before_chain_wires() {
        let mut unit = DesignUnit::new("f", 32);
        unit.add_signal("a_addr", 16);
        unit.add_instance(PipelineInstance::new(BinOp::Add, "a_addr", "a_addr", "s", 16));
        unit.add_return_instance(PipelineInstance::new(BinOp::Mul, "s", "s", "t", 32));
        let text = unit.render();
        let slot = text.find("signal a_addr : std_ulogic_vector(0 to 16 - 1);\n").unwrap();
        let wire = text.find("signal s : std_ulogic_vector(0 to 16 - 1);\n").unwrap();
        let begin = text.find("begin\n").unwrap();
        assert!(slot < wire && wire < begin);
    }
}
