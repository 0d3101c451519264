pub mod ute;
