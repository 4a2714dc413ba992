use log::trace;

use super::inspect::{fragment_mut, line_mut, locate_fragment, locate_line};
use super::DocumentEditor;
use crate::document::{NodeId, StyleSet};

/// The operation half of a formatting action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Always write the value.
    Set,
    /// Always remove the property.
    Unset,
    /// Remove when present with a non-empty value, else set.
    Toggle,
    /// Set only when currently absent.
    Initialize,
    /// Add the declaration's magnitude to the current one.
    Increment,
    /// Subtract the declaration's magnitude from the current one.
    Decrement,
    /// Not a style mutation: `clear`, `list <keyword>`.
    Command,
    /// Forwarded to the injected menu-action strategy.
    Callback,
}

impl Instruction {
    /// Resolve a menu dataset key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "set" => Some(Self::Set),
            "unset" => Some(Self::Unset),
            "toggle" => Some(Self::Toggle),
            "initialize" => Some(Self::Initialize),
            "increment" => Some(Self::Increment),
            "decrement" => Some(Self::Decrement),
            "command" => Some(Self::Command),
            "callback" => Some(Self::Callback),
            _ => None,
        }
    }
}

/// A node a formatting action applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleTarget {
    Line(NodeId),
    Fragment(NodeId),
}

impl StyleTarget {
    pub fn id(&self) -> NodeId {
        match self {
            StyleTarget::Line(id) | StyleTarget::Fragment(id) => *id,
        }
    }
}

/// Leading signed decimal magnitude of a value, truncated; 0 when the value
/// carries none.
pub(crate) fn extract_amount(value: &str) -> i64 {
    let value = value.trim();
    let mut end = 0;
    let bytes = value.as_bytes();
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return 0;
    }
    value[..end].parse::<f64>().map(|n| n as i64).unwrap_or(0)
}

impl DocumentEditor {
    /// Dispatch one instruction over the targets: style mutations apply
    /// directly, commands go to the list engine, callbacks to the injected
    /// menu-action strategy.
    pub(crate) fn process_instruction(
        &mut self,
        targets: &[StyleTarget],
        instruction: Instruction,
        declarations: &[String],
    ) -> bool {
        match instruction {
            Instruction::Command => self.apply_command(targets, declarations),
            Instruction::Callback => {
                (self.options.on_menu_action)(declarations, targets);
                true
            }
            _ => self.apply_style(targets, instruction, declarations),
        }
    }

    /// Apply the declarations to every target, element-wise in target order.
    pub(crate) fn apply_style(
        &mut self,
        targets: &[StyleTarget],
        instruction: Instruction,
        declarations: &[String],
    ) -> bool {
        let mut applied = false;
        for target in targets {
            for declaration in declarations {
                let Some((property, value)) = declaration.split_once(':') else {
                    continue;
                };
                if self.apply_declaration(*target, instruction, property.trim(), value.trim()) {
                    applied = true;
                }
            }
        }
        applied
    }

    fn apply_declaration(
        &mut self,
        target: StyleTarget,
        instruction: Instruction,
        property: &str,
        value: &str,
    ) -> bool {
        let current = self
            .target_style(&target)
            .and_then(|style| style.get(property))
            .map(str::to_string);

        match instruction {
            Instruction::Unset => {
                self.target_style_mut(&target)
                    .is_some_and(|style| style.remove(property))
            }
            Instruction::Toggle if current.as_deref().is_some_and(|v| !v.is_empty()) => {
                self.target_style_mut(&target)
                    .is_some_and(|style| style.remove(property))
            }
            Instruction::Set | Instruction::Toggle => {
                let Some(style) = self.target_style_mut(&target) else {
                    return false;
                };
                style.set(property, value);
                true
            }
            Instruction::Initialize => {
                if current.is_some() {
                    return false;
                }
                let Some(style) = self.target_style_mut(&target) else {
                    return false;
                };
                style.set(property, value);
                true
            }
            Instruction::Increment | Instruction::Decrement => {
                // Fall back to the host's computed value for a property that
                // is not set locally.
                let effective = current.or_else(|| {
                    self.options
                        .computed_style
                        .as_ref()
                        .and_then(|computed| computed(target.id(), property))
                });
                let amount = extract_amount(value);
                let mut magnitude = extract_amount(effective.as_deref().unwrap_or(""));
                if instruction == Instruction::Increment {
                    magnitude += amount;
                } else {
                    magnitude -= amount;
                }
                let Some(style) = self.target_style_mut(&target) else {
                    return false;
                };
                if magnitude <= 0 {
                    style.remove(property);
                } else {
                    style.set(property, &format!("{magnitude}px"));
                }
                true
            }
            Instruction::Command | Instruction::Callback => false,
        }
    }

    /// Process command payloads: `clear` strips all styling from the target,
    /// `list <keyword>` drives the list engine on the target's line.
    pub(crate) fn apply_command(&mut self, targets: &[StyleTarget], commands: &[String]) -> bool {
        let mut applied = false;
        for target in targets {
            for command in commands {
                if command == "clear" {
                    if let Some(style) = self.target_style_mut(target) {
                        style.clear();
                        applied = true;
                    }
                    continue;
                }
                let Some(keyword) = command.strip_prefix("list").map(str::trim) else {
                    continue;
                };
                if keyword.is_empty() {
                    continue;
                }
                let Some(line_id) = self.target_line(target) else {
                    continue;
                };
                trace!("list command {keyword:?} on line {line_id:?}");
                let Some(path) = locate_line(&self.document, line_id) else {
                    continue;
                };
                let handled = match keyword {
                    "indent" => self.indent_line_at(&path, None, true),
                    "outdent" => self.outdent_line_at(&path, true),
                    prefix => self.toggle_list_at(&path, prefix),
                };
                if handled {
                    applied = true;
                }
            }
        }
        applied
    }

    fn target_style(&self, target: &StyleTarget) -> Option<&StyleSet> {
        match target {
            StyleTarget::Line(id) => {
                let path = locate_line(&self.document, *id)?;
                super::inspect::line_ref(&self.document, &path).map(|line| &line.style)
            }
            StyleTarget::Fragment(id) => {
                let (path, index) = locate_fragment(&self.document, *id)?;
                super::inspect::fragment_ref(&self.document, &path, index)
                    .map(|fragment| &fragment.style)
            }
        }
    }

    fn target_style_mut(&mut self, target: &StyleTarget) -> Option<&mut StyleSet> {
        match target {
            StyleTarget::Line(id) => {
                let path = locate_line(&self.document, *id)?;
                line_mut(&mut self.document, &path).map(|line| &mut line.style)
            }
            StyleTarget::Fragment(id) => {
                let (path, index) = locate_fragment(&self.document, *id)?;
                fragment_mut(&mut self.document, &path, index).map(|fragment| &mut fragment.style)
            }
        }
    }

    /// The line a command target lives on: the line itself, or the owner of
    /// a fragment target.
    fn target_line(&self, target: &StyleTarget) -> Option<NodeId> {
        match target {
            StyleTarget::Line(id) => Some(*id),
            StyleTarget::Fragment(id) => {
                let (path, _) = locate_fragment(&self.document, *id)?;
                super::inspect::line_ref(&self.document, &path).map(|line| line.id)
            }
        }
    }
}
