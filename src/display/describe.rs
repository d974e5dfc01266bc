//! describe.rs
//! Renders an expression as readable text with known values substituted.
//! Subtrees whose inputs are all known collapse to their computed value; dice
//! always stay symbolic. Presentation only, never used for evaluation.

use crate::expr::eval::{project, Bindings, NoBindings};
use crate::expr::node::ParseNode;
use crate::value::Value;

pub struct DescProps<'a> {
    pub bindings: &'a dyn Bindings,
    /// Substitute identifier values, leaving only dice symbolic.
    pub dice_only: bool,
}

impl DescProps<'static> {
    /// Every identifier prints by name.
    pub fn symbolic() -> Self {
        DescProps { bindings: &NoBindings, dice_only: false }
    }
}

enum Described {
    Value(Value),
    Text(String),
}

impl Described {
    fn render(self) -> String {
        match self {
            Described::Text(t) => t,
            Described::Value(v) => v.literal(),
        }
    }
}

pub fn describe(node: &ParseNode, props: &DescProps<'_>) -> String {
    let text = match describe_inner(node, props) {
        Described::Text(t) => t,
        Described::Value(v) => v.to_string(),
    };
    strip_outer_parens(text)
}

fn describe_inner(node: &ParseNode, props: &DescProps<'_>) -> Described {
    match node {
        ParseNode::Number(n) => Described::Value(Value::Number(*n)),
        ParseNode::Text(s) => Described::Value(Value::Text(s.clone())),
        ParseNode::Bool(b) => Described::Value(Value::Bool(*b)),
        ParseNode::Dice { count, sides } => Described::Text(format!("{}d{}", count, sides)),
        ParseNode::Identifier { name, .. } => {
            if props.dice_only {
                if let Some(v) = props.bindings.lookup(name) {
                    return Described::Value(v);
                }
            }
            Described::Text(name.clone())
        }
        ParseNode::Member { object, field } => match describe_inner(object, props) {
            Described::Text(t) => Described::Text(format!("{}.{}", t, field)),
            Described::Value(v) => match project(&v, field, props.bindings) {
                Ok(projected) => Described::Value(projected),
                Err(_) => Described::Text(format!("{}.{}", v.literal(), field)),
            },
        },
        ParseNode::Func { func, args } => {
            let described: Vec<Described> = args.iter().map(|a| describe_inner(a, props)).collect();

            if described.iter().all(|d| matches!(d, Described::Value(_))) {
                let values: Vec<Value> = described
                    .iter()
                    .filter_map(|d| match d {
                        Described::Value(v) => Some(v.clone()),
                        Described::Text(_) => None,
                    })
                    .collect();
                if let Ok(v) = func.apply(&values) {
                    return Described::Value(v);
                }
            }

            let parts: Vec<String> = described.into_iter().map(Described::render).collect();
            let text = match (func.op, parts.as_slice()) {
                (true, [only]) => format!("{}{}", func.name, only),
                (true, [left, right]) => format!("({} {} {})", left, func.name, right),
                _ => format!("{}({})", func.name, parts.join(", ")),
            };
            Described::Text(text)
        }
    }
}

/// Drops one pair of parentheses when they enclose the whole string.
fn strip_outer_parens(text: String) -> String {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return text;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;
    let last = text.len() - 1;
    for (i, c) in text.char_indices() {
        if in_quote {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_quote = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != last {
                    return text;
                }
            }
            _ => {}
        }
    }
    text[1..last].to_string()
}
