use proc_macro2::TokenStream;
use syn::Type;

use crate::pred::PredId;

/// A named rule. The rule exclusively owns the tree under `body`.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    /// Name of the boolean recognizer variant, if one is generated.
    pub recognizer_name: Option<String>,
    /// Only the recognizer variant is generated.
    pub recognizer_only: bool,
    pub return_type: Option<Type>,
    /// Value returned by the parse method.
    pub result: Option<TokenStream>,
    pub body: PredId,
    /// Token rules can be followed by anything.
    pub is_token: bool,
    pub is_private: bool,
    /// Overrides the grammar-wide lookahead.
    pub k: Option<usize>,
}

impl Rule {
    pub fn new(name: impl Into<String>, body: PredId) -> Self {
        Rule {
            name: name.into(),
            recognizer_name: None,
            recognizer_only: false,
            return_type: None,
            result: None,
            body,
            is_token: false,
            is_private: false,
            k: None,
        }
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_result(mut self, result: TokenStream) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_recognizer(mut self, name: impl Into<String>) -> Self {
        self.recognizer_name = Some(name.into());
        self
    }

    pub fn token(mut self) -> Self {
        self.is_token = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn generates_parser(&self) -> bool {
        !self.recognizer_only
    }
}
