use std::rc::Rc;

use crate::value::Value;

pub type VarId = u32;

/// A term pattern. Variables are identified by interned ids; two variables
/// with the same name share the same id. Anonymous variables never bind.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(Value),
    Variable(VarId),
    Anonymous(VarId),
    Tuple {
        head: Vec<Rc<Pattern>>,
        // rest is a Variable or Anonymous capturing the remaining elements
        rest: Option<Rc<Pattern>>,
    },
}

impl Pattern {
    pub fn literal(value: Value) -> Rc<Pattern> {
        Rc::new(Pattern::Literal(value))
    }

    pub fn variable(id: VarId) -> Rc<Pattern> {
        Rc::new(Pattern::Variable(id))
    }

    pub fn anonymous(id: VarId) -> Rc<Pattern> {
        Rc::new(Pattern::Anonymous(id))
    }

    pub fn tuple(head: Vec<Rc<Pattern>>) -> Rc<Pattern> {
        Rc::new(Pattern::Tuple { head, rest: None })
    }

    pub fn tuple_with_rest(head: Vec<Rc<Pattern>>, rest: Rc<Pattern>) -> Rc<Pattern> {
        debug_assert!(matches!(
            *rest,
            Pattern::Variable(_) | Pattern::Anonymous(_)
        ));
        Rc::new(Pattern::Tuple {
            head,
            rest: Some(rest),
        })
    }

    pub fn var_id(&self) -> Option<VarId> {
        match self {
            Pattern::Variable(id) | Pattern::Anonymous(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Pattern::Variable(_))
    }

    /// Collect the non-anonymous variable ids of this pattern in order of
    /// first appearance.
    pub fn collect_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Pattern::Literal(_) | Pattern::Anonymous(_) => {}
            Pattern::Variable(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            Pattern::Tuple { head, rest } => {
                for item in head {
                    item.collect_vars(out);
                }
                if let Some(rest) = rest {
                    rest.collect_vars(out);
                }
            }
        }
    }
}
