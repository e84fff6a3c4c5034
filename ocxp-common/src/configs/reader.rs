use serde::Deserialize;
use std::fs::read_to_string;

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
}

pub struct YamlAgentConfig {}

impl YamlAgentConfig {
    pub fn read(filename: &str) -> Result<String, String> {
        let result: Result<String, _> = read_to_string(filename);
        match result {
            Ok(config) => Ok(config),
            Err(e) => {
                debug!("error on file opening: {}", e);
                Err(format!("error on config file opening {}: {}", filename, e))
            }
        }
    }

    pub fn parse<T>(config: &str) -> Result<T, String>
    where
        T: for<'de> Deserialize<'de> + Validatable,
    {
        let result: Result<T, _> = serde_yaml::from_str(config);
        match result {
            Ok(conf) => Ok(conf),
            Err(e) => {
                debug!("error on yaml parsing: {}", e);
                Err(format!("error on yaml parsing: {}", e))
            }
        }
    }

    pub fn get<T>(filename: &str) -> Result<T, String>
    where
        T: for<'de> Deserialize<'de> + Validatable,
    {
        let file = Self::read(filename)?;
        let config: T = Self::parse(&file)?;
        match config.validate() {
            Ok(_) => Ok(config),
            Err(e) => {
                debug!("config is not valid: {}", e);
                Err(format!("config is not valid: {}", e))
            }
        }
    }
}
