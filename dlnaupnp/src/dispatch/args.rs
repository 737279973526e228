//! Arguments d'une action, ordonnés.

use std::fmt::Display;
use std::str::FromStr;

use crate::errors::UpnpError;

/// Liste ordonnée `(nom, valeur)` des arguments IN ou OUT d'une action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs(Vec<(String, String)>);

impl ActionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remplace la valeur existante ou ajoute l'argument en fin de liste.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    /// Argument obligatoire sous forme de chaîne.
    pub fn required(&self, name: &str) -> Result<&str, UpnpError> {
        self.get(name)
            .ok_or_else(|| UpnpError::InvalidArgs(format!("missing argument {}", name)))
    }

    /// Argument obligatoire converti dans le type demandé.
    pub fn parse<T>(&self, name: &str) -> Result<T, UpnpError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required(name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| UpnpError::ArgumentValueInvalid(format!("{}: {}", name, e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

impl From<Vec<(String, String)>> for ActionArgs {
    fn from(args: Vec<(String, String)>) -> Self {
        Self(args)
    }
}

impl FromIterator<(String, String)> for ActionArgs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut args = ActionArgs::new().with("A", 1).with("B", "x");
        args.set("A", 2);
        assert_eq!(args.iter().collect::<Vec<_>>(), vec![("A", "2"), ("B", "x")]);
    }

    #[test]
    fn test_parse() {
        let args = ActionArgs::new().with("StartingIndex", "5").with("Bad", "five");
        assert_eq!(args.parse::<u32>("StartingIndex"), Ok(5));
        assert!(matches!(
            args.parse::<u32>("Bad"),
            Err(UpnpError::ArgumentValueInvalid(_))
        ));
        assert!(matches!(
            args.parse::<u32>("RequestedCount"),
            Err(UpnpError::InvalidArgs(_))
        ));
    }
}
