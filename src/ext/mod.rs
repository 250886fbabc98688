mod error;
mod run;
