//! Action inputs: literals, future references, and lists of either.

use super::FutureRef;
use crate::types::{Address, FutureId};
use crate::value::Value;

/// One input of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// The value of a future, known once it resolves.
    Future(FutureId),
    /// A constant.
    Literal(Value),
    /// An ordered list (array arguments).
    List(Vec<Argument>),
}

impl Argument {
    /// Every future referenced by this argument, in order of appearance.
    pub fn futures(&self) -> Vec<&FutureId> {
        let mut out = Vec::new();
        self.collect_futures(&mut out);
        out
    }

    fn collect_futures<'a>(&'a self, out: &mut Vec<&'a FutureId>) {
        match self {
            Self::Future(id) => out.push(id),
            Self::Literal(_) => {}
            Self::List(items) => {
                for item in items {
                    item.collect_futures(out);
                }
            }
        }
    }

    /// Returns the referenced future if this is a plain future reference.
    pub fn as_future(&self) -> Option<&FutureId> {
        match self {
            Self::Future(id) => Some(id),
            _ => None,
        }
    }
}

impl From<&FutureRef> for Argument {
    fn from(f: &FutureRef) -> Self {
        Self::Future(f.id().clone())
    }
}

impl From<FutureRef> for Argument {
    fn from(f: FutureRef) -> Self {
        Self::Future(f.id().clone())
    }
}

impl From<Value> for Argument {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Self::Literal(Value::string(v))
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Self::Literal(Value::string(v))
    }
}

impl From<i64> for Argument {
    fn from(v: i64) -> Self {
        Self::Literal(Value::int(v))
    }
}

impl From<u64> for Argument {
    fn from(v: u64) -> Self {
        Self::Literal(Value::uint(v))
    }
}

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Self::Literal(Value::bool(v))
    }
}

impl From<Address> for Argument {
    fn from(v: Address) -> Self {
        Self::Literal(Value::address(v))
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::FutureKind;
    use crate::types::ModuleId;

    #[test]
    fn nested_futures_are_collected_in_order() {
        let module = ModuleId::new("M", None);
        let a = FutureRef::new(FutureId::new(&module, "A"), FutureKind::ContractHandle);
        let b = FutureRef::new(FutureId::new(&module, "B"), FutureKind::Address);

        let arg = Argument::List(vec![
            Argument::from(&a),
            Argument::from("0x"),
            Argument::List(vec![Argument::from(&b)]),
        ]);

        let ids: Vec<&str> = arg.futures().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["M#A", "M#B"]);
    }
}
