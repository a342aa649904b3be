pub mod gamificationmodel;
pub mod usermodel;
