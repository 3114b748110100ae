


use serde::{Serialize, Deserialize};
use thiserror::Error;


pub const STATUS_PROCESSING: &str = "Processing";
pub const NICKNAME_MAX_CHARS: usize = 8;
const NICKNAME_PUNCTUATION: &str = "!@#$%^&*()_+=[]{};':\"\\|,.<>/?`~ -";

/* games a code number can be requested for */
pub const GAMES: &[&str] = &[
    "FireKirin",
    "MilkyWay",
    "OrionStars",
    "Juwa",
    "GameVault",
    "VegasSweep",
    "YOLO",
    "UltraPanda",
    "VBlink",
    "Blue Dragon",
    "Game Room",
    "Mr. All In One",
];


#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError{
    #[error("nickname must be 1 to {max} characters")]
    NicknameLength{ max: usize },
    #[error("nickname can't contain {0:?}")]
    NicknameCharacter(char),
    #[error("unknown category {0}")]
    UnknownCategory(String),
    #[error("category {0} is already registered")]
    AlreadyRegistered(String),
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest{
    pub category: String,
    pub nickname: String,
    pub token: String,
    pub status: String,
    pub id: String,
}

impl RegistrationRequest{

    /// Validates the nickname and category against what `id` already
    /// holds and builds a request in the `Processing` state.
    pub fn new(
        category: &str,
        nickname: &str,
        token: &str,
        id: &str,
        all: &[&str],
        registered: &[String],
    ) -> Result<Self, RegistrationError>{

        validate_nickname(nickname)?;
        if !all.contains(&category){
            return Err(RegistrationError::UnknownCategory(category.to_string()));
        }
        if registered.iter().any(|r| r == category){
            return Err(RegistrationError::AlreadyRegistered(category.to_string()));
        }

        Ok(Self{
            category: category.to_string(),
            nickname: nickname.to_string(),
            token: token.to_string(),
            status: STATUS_PROCESSING.to_string(),
            id: id.to_string(),
        })
    }

}


pub fn validate_nickname(nickname: &str) -> Result<(), RegistrationError>{
    let chars = nickname.chars().count();
    if chars == 0 || chars > NICKNAME_MAX_CHARS{
        return Err(RegistrationError::NicknameLength{ max: NICKNAME_MAX_CHARS });
    }
    match nickname.chars().find(|c| !c.is_ascii_alphabetic() && !NICKNAME_PUNCTUATION.contains(*c)){
        Some(bad) => Err(RegistrationError::NicknameCharacter(bad)),
        None => Ok(()),
    }
}

pub fn available_categories<'c>(all: &[&'c str], registered: &[String]) -> Vec<&'c str>{
    all.iter()
        .copied()
        .filter(|c| !registered.iter().any(|r| r == c))
        .collect()
}
