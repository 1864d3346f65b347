use syn::{parse_quote, Attribute, Lit, Meta, NestedMeta, Path, Type};

use crate::error::{GenError, Result};

const LLK_ATTR: &str = "llk";

/// Grammar-wide generator settings.
#[derive(Clone, Debug)]
pub struct Options {
    /// Lookahead budget. Rules may override it.
    pub k: usize,
    /// Type of variables that save a matched terminal.
    pub terminal_type: Option<Type>,
    /// Container used for `label+:` variables.
    pub list_type: Path,
    /// Rule calls that may nest without consuming input.
    pub recursion_limit: usize,
    /// Minimum number of branches handled by a `match` before one is used.
    pub switch_threshold: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            k: 2,
            terminal_type: Some(parse_quote!(i32)),
            list_type: parse_quote!(Vec),
            recursion_limit: 32,
            switch_threshold: 4,
        }
    }
}

impl Options {
    /// Reads settings from `#[llk(...)]` attributes, starting from the
    /// defaults.
    ///
    /// ```
    /// use llkgen::Options;
    /// use syn::DeriveInput;
    ///
    /// let ast: DeriveInput = syn::parse_str("#[llk(k = 3)] struct P;").unwrap();
    /// let options = Options::from_attrs(&ast.attrs).unwrap();
    /// assert_eq!(options.k, 3);
    /// ```
    pub fn from_attrs(attrs: &[Attribute]) -> Result<Options> {
        let mut options = Options::default();
        for attr in attrs.iter().filter(|attr| attr.path.is_ident(LLK_ATTR)) {
            let list = match attr.parse_meta()? {
                Meta::List(list) => list,
                _ => {
                    return Err(GenError::InvalidOption(
                        "expected #[llk(key = value, ...)]".to_owned(),
                    ))
                }
            };
            for nested in list.nested.iter() {
                match nested {
                    NestedMeta::Meta(Meta::NameValue(val)) => {
                        let key = match val.path.get_ident() {
                            Some(ident) => ident.to_string(),
                            None => {
                                return Err(GenError::InvalidOption(
                                    "option names are plain identifiers".to_owned(),
                                ))
                            }
                        };
                        options.set(&key, &val.lit)?;
                    }
                    _ => {
                        return Err(GenError::InvalidOption(
                            "options are written as key = value".to_owned(),
                        ))
                    }
                }
            }
        }
        options.check()?;
        Ok(options)
    }

    fn set(&mut self, key: &str, lit: &Lit) -> Result<()> {
        match (key, lit) {
            ("k", Lit::Int(i)) => self.k = i.base10_parse()?,
            ("recursion_limit", Lit::Int(i)) => self.recursion_limit = i.base10_parse()?,
            ("switch_threshold", Lit::Int(i)) => self.switch_threshold = i.base10_parse()?,
            ("terminal_type", Lit::Str(s)) => self.terminal_type = Some(s.parse()?),
            ("list_type", Lit::Str(s)) => self.list_type = s.parse()?,
            ("k", _) | ("recursion_limit", _) | ("switch_threshold", _) => {
                return Err(GenError::InvalidOption(format!(
                    "'{}' must be an integer",
                    key
                )))
            }
            ("terminal_type", _) | ("list_type", _) => {
                return Err(GenError::InvalidOption(format!("'{}' must be a string", key)))
            }
            _ => return Err(GenError::InvalidOption(format!("unknown option '{}'", key))),
        }
        Ok(())
    }

    pub fn check(&self) -> Result<()> {
        if self.k == 0 {
            return Err(GenError::InvalidOption(
                "'k' must be at least 1".to_owned(),
            ));
        }
        if self.recursion_limit == 0 {
            return Err(GenError::InvalidOption(
                "'recursion_limit' must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;
    use syn::{parse_str, DeriveInput};

    fn options_for(def: &str) -> Result<Options> {
        let ast: DeriveInput = parse_str(def).unwrap();
        Options::from_attrs(&ast.attrs)
    }

    #[test]
    fn defaults_without_attributes() {
        let options = options_for("struct Dummy;").unwrap();
        assert_eq!(options.k, 2);
        let ty = options.terminal_type.unwrap();
        assert_eq!(quote!(#ty).to_string(), "i32");
    }

    #[test]
    fn reads_every_key() {
        let options = options_for(
            "
            #[llk(k = 3, terminal_type = \"u8\", list_type = \"smallvec::SmallVec\")]
            #[llk(recursion_limit = 8, switch_threshold = 2)]
            struct Dummy;
            ",
        )
        .unwrap();
        assert_eq!(options.k, 3);
        assert_eq!(options.recursion_limit, 8);
        assert_eq!(options.switch_threshold, 2);
        let list = &options.list_type;
        assert_eq!(quote!(#list).to_string(), "smallvec :: SmallVec");
    }

    #[test]
    fn unknown_key() {
        let err = options_for("#[llk(depth = 3)] struct Dummy;").unwrap_err();
        assert_eq!(
            err,
            GenError::InvalidOption("unknown option 'depth'".to_owned())
        );
    }

    #[test]
    fn zero_lookahead() {
        let err = options_for("#[llk(k = 0)] struct Dummy;").unwrap_err();
        assert_eq!(
            err,
            GenError::InvalidOption("'k' must be at least 1".to_owned())
        );
    }
}
