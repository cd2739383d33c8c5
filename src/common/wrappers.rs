//! Index wrappers.

wrap_usize! {
    #[doc = "Index of a node in a formula."]
    FIdx
}

wrap_usize! {
    #[doc = "Index of a node in an instantiation tree."]
    NodeIdx
}

wrap_usize! {
    #[doc = "Stable identity of a context."]
    CtxId
}
