use crate::entity::Entity;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt::Write;

pub fn format_trace(entity: &Entity, target: usize) -> String {
    let mut tracer = Tracer { entity, visited_at_level: HashMap::new(), output: String::new() };

    match entity.template().attrs().get(target) {
        Some(attr) => {
            let _ = writeln!(tracer.output, "AUDIT TRACE for attribute '{}.{}' on {}:", entity.template_name(), attr.name, entity.id());
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_attr(target, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: Invalid attribute index {}", target);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    entity: &'a Entity,
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_attr(&mut self, attr: usize, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&attr) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(attr, level);

        let template = self.entity.template().clone();
        let def = &template.attrs()[attr];
        let line_header = format!("[L{}] {}{}", level, def.name, format_value(self.entity.value_at(attr)));

        match &def.calc {
            None => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, line_header);
            }
            Some(calc) => {
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, calc.source());
                let children: Vec<usize> =
                    template.depends_of(&def.name).into_iter().filter_map(|name| template.attr_index(name)).collect();
                self.recurse_children(prefix, &children, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[usize], level: usize) {
        let stem = build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            self.trace_attr(child, level + 1, &format!("{}{}", stem, connector));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value.list_len() {
        Some(1) => format!("[{}]", value.elements()[0].literal()),
        Some(n) => format!("[len={}]", n),
        None => format!("[{}]", value.literal()),
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}
