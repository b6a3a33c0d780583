use super::*;

/// A stack-resident storage slot ("LOCAL" in the opcode taxonomy). Locals are
/// never GVN-eligible: two locals of the same type are still distinct storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Local(pub(crate) generational_arena::Index);

#[derive(Clone)]
pub(crate) struct LocalContent {
    pub(crate) dt: Dt,
    pub(crate) is_mutable: bool,
    pub(crate) initializer: Option<Constant>,
}

impl Local {
    pub(crate) fn new(
        context: &mut Context,
        dt: Dt,
        is_mutable: bool,
        initializer: Option<Constant>,
    ) -> Self {
        let content = LocalContent {
            dt,
            is_mutable,
            initializer,
        };
        Local(context.locals.insert(content))
    }

    pub(crate) fn get_type(&self, context: &Context) -> Dt {
        context.locals[self.0].dt
    }

    pub(crate) fn is_mutable(&self, context: &Context) -> bool {
        context.locals[self.0].is_mutable
    }
}
