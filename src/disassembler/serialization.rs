use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{disassembler::Disassembly, snes_utils::addr::AddrSnes};

/// Renderer-facing line records. Output emitters consume this model; the
/// analysis itself never mutates decoded lines.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LineKind {
    Meta {
        file: String,
    },
    Label {
        label:   String,
        #[serde(skip_serializing_if = "String::is_empty")]
        #[serde(default)]
        comment: String,
    },
    Op {
        op:      String,
        #[serde(skip_serializing_if = "String::is_empty")]
        #[serde(default)]
        arg:     String,
        #[serde(skip_serializing_if = "String::is_empty")]
        #[serde(default)]
        comment: String,
    },
    Empty {},
}

/// Joins the immutable line list with the label and comment side maps.
/// Operands naming a labelled address render as the label.
pub fn render_lines(
    disasm: &Disassembly, labels: &BTreeMap<AddrSnes, String>, comments: &BTreeMap<AddrSnes, String>,
) -> Vec<LineKind> {
    let mut out = Vec::with_capacity(disasm.lines.len() * 2);
    let mut previous_contiguous = true;

    for insn in &disasm.lines {
        if !previous_contiguous {
            out.push(LineKind::Empty {});
        }
        if let Some(label) = labels.get(&insn.addr) {
            out.push(LineKind::Label { label: label.clone(), comment: String::new() });
        }
        let rendered = insn.display().to_string();
        let (op, mut arg) = match rendered.split_once(' ') {
            Some((op, arg)) => (op.to_string(), arg.to_string()),
            None => (rendered, String::new()),
        };
        if let Some(name) = insn.operand_address().and_then(|target| labels.get(&target)) {
            arg = substitute_operand(&arg, name);
        }
        out.push(LineKind::Op { op, arg, comment: comments.get(&insn.addr).cloned().unwrap_or_default() });
        previous_contiguous = disasm.line_at(insn.next_addr()).is_some();
    }
    out
}

/// Swaps the `$XXXX` literal inside an operand for a symbol name, keeping any
/// addressing-mode decoration around it.
fn substitute_operand(arg: &str, name: &str) -> String {
    let Some(dollar) = arg.find('$') else { return name.to_string() };
    let tail = arg[dollar + 1..].find(|c: char| !c.is_ascii_hexdigit()).map_or(arg.len(), |i| dollar + 1 + i);
    format!("{}{}{}", &arg[..dollar], name, &arg[tail..])
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_model_round_trips_through_json() {
        let lines = vec![
            LineKind::Meta { file: "bank_00.asm".into() },
            LineKind::Label { label: "CODE_008000".into(), comment: String::new() },
            LineKind::Op { op: "LDA".into(), arg: "#$12".into(), comment: "entry".into() },
            LineKind::Op { op: "RTS".into(), arg: String::new(), comment: String::new() },
            LineKind::Empty {},
        ];
        let json = serde_json::to_string(&lines).unwrap();
        let back: Vec<LineKind> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lines);
    }

    #[test]
    fn operand_substitution_keeps_mode_decoration() {
        assert_eq!(substitute_operand("$8123", "CODE_008123"), "CODE_008123");
        assert_eq!(substitute_operand("($C100, X)", "DATA_00C100"), "(DATA_00C100, X)");
        assert_eq!(substitute_operand("$12, Y", "ptr"), "ptr, Y");
    }

    #[test]
    fn empty_comments_are_omitted() {
        let op = LineKind::Op { op: "RTS".into(), arg: String::new(), comment: String::new() };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"op":"RTS"}"#);
    }
}
