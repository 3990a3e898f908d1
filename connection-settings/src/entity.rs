// Entity Framework connection strings wrapping a SQL Server connection string
use crate::connection_string::{append_pair, normalize_key, parse_pairs};
use crate::error::{SettingsError, SettingsResult};
use crate::setting::{ConnectionSetting, ENTITY_CLIENT_PROVIDER};
use crate::sql::{SqlConnectionParameters, SqlConnectionSetting};
use std::fmt;

const RESOURCE_PREFIX: &str = "res://*/";
const METADATA_EXTENSIONS: [&str; 3] = ["csdl", "ssdl", "msl"];

const METADATA_KEY: &str = "metadata";
const PROVIDER_KEY: &str = "provider";
const PROVIDER_CONNECTION_STRING_KEY: &str = "provider connection string";

/// Conceptual, storage and mapping resource locators for `model`, pipe-joined.
pub fn model_metadata(model: &str) -> String {
    METADATA_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}.{}", RESOURCE_PREFIX, model, ext))
        .collect::<Vec<_>>()
        .join("|")
}

/// Recovers the model name from a metadata value produced by [`model_metadata`].
pub fn model_from_metadata(metadata: &str) -> SettingsResult<String> {
    let invalid = || SettingsError::InvalidMetadata(metadata.to_string());
    let segments: Vec<&str> = metadata.split('|').map(str::trim).collect();
    if segments.len() != METADATA_EXTENSIONS.len() {
        return Err(invalid());
    }

    let mut model: Option<&str> = None;
    for (segment, ext) in segments.iter().zip(METADATA_EXTENSIONS) {
        let name = segment
            .strip_prefix(RESOURCE_PREFIX)
            .and_then(|rest| rest.strip_suffix(ext))
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(invalid)?;
        match model {
            Some(existing) if existing != name => return Err(invalid()),
            _ => model = Some(name),
        }
    }

    model.map(str::to_string).ok_or_else(invalid)
}

/// The three keywords of an entity connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityConnectionStringBuilder {
    pub metadata: String,
    pub provider: String,
    pub provider_connection_string: String,
}

impl EntityConnectionStringBuilder {
    pub fn parse(connection_string: &str) -> SettingsResult<Self> {
        let mut builder = Self::default();
        for (key, value) in parse_pairs(connection_string)? {
            match normalize_key(&key).as_str() {
                METADATA_KEY => builder.metadata = value,
                PROVIDER_KEY => builder.provider = value,
                PROVIDER_CONNECTION_STRING_KEY => builder.provider_connection_string = value,
                _ => {
                    return Err(SettingsError::InvalidFormat {
                        position: 0,
                        message: format!("unsupported entity keyword '{}'", key),
                    })
                }
            }
        }

        for (key, value) in [
            (METADATA_KEY, &builder.metadata),
            (PROVIDER_KEY, &builder.provider),
            (PROVIDER_CONNECTION_STRING_KEY, &builder.provider_connection_string),
        ] {
            if value.is_empty() {
                return Err(SettingsError::MissingKeyword(key.to_string()));
            }
        }
        Ok(builder)
    }
}

impl fmt::Display for EntityConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        append_pair(&mut out, METADATA_KEY, &self.metadata);
        append_pair(&mut out, PROVIDER_KEY, &self.provider);
        append_pair(&mut out, PROVIDER_CONNECTION_STRING_KEY, &self.provider_connection_string);
        f.write_str(&out)
    }
}

/// An entity connection string: model metadata plus a wrapped SQL Server
/// connection string and the provider that interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityConnectionSetting {
    setting: ConnectionSetting,
    builder: EntityConnectionStringBuilder,
    model: String,
}

impl EntityConnectionSetting {
    pub const PROVIDER: &'static str = ENTITY_CLIENT_PROVIDER;

    /// Wraps an already built SQL connection string, reusing its provider.
    pub fn from_sql(model: impl Into<String>, sql: &SqlConnectionSetting) -> Self {
        Self::wrap(model.into(), sql.provider(), sql.connection_string())
    }

    /// Builds the SQL connection string from raw parameters first.
    pub fn new(
        model: impl Into<String>,
        model_provider: &str,
        parameters: &SqlConnectionParameters,
    ) -> Self {
        let sql = SqlConnectionSetting::new(parameters);
        Self::wrap(model.into(), model_provider, sql.connection_string())
    }

    pub fn parse(connection_string: &str) -> SettingsResult<Self> {
        let builder = EntityConnectionStringBuilder::parse(connection_string)?;
        let model = model_from_metadata(&builder.metadata)?;
        let setting = ConnectionSetting::with_connection_string(Self::PROVIDER, builder.to_string());
        Ok(Self {
            setting,
            builder,
            model,
        })
    }

    fn wrap(model: String, provider: &str, provider_connection_string: &str) -> Self {
        let builder = EntityConnectionStringBuilder {
            metadata: model_metadata(&model),
            provider: provider.to_string(),
            provider_connection_string: provider_connection_string.to_string(),
        };
        let setting = ConnectionSetting::with_connection_string(Self::PROVIDER, builder.to_string());
        Self {
            setting,
            builder,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn metadata(&self) -> &str {
        &self.builder.metadata
    }

    /// Provider of the wrapped connection string.
    pub fn model_provider(&self) -> &str {
        &self.builder.provider
    }

    pub fn provider_connection_string(&self) -> &str {
        &self.builder.provider_connection_string
    }

    pub fn connection_string(&self) -> &str {
        &self.setting.connection_string
    }

    pub fn provider(&self) -> &str {
        &self.setting.provider
    }

    pub fn builder(&self) -> &EntityConnectionStringBuilder {
        &self.builder
    }

    /// Parses the wrapped SQL connection string.
    pub fn sql_setting(&self) -> SettingsResult<SqlConnectionSetting> {
        SqlConnectionSetting::parse(&self.builder.provider_connection_string)
    }

    pub fn as_setting(&self) -> &ConnectionSetting {
        &self.setting
    }

    pub fn into_setting(self) -> ConnectionSetting {
        self.setting
    }
}

impl From<EntityConnectionSetting> for ConnectionSetting {
    fn from(setting: EntityConnectionSetting) -> Self {
        setting.into_setting()
    }
}

impl fmt::Display for EntityConnectionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.connection_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setting::SQL_CLIENT_PROVIDER;

    #[test]
    fn test_metadata_has_three_segments() {
        for model in ["Model", "HealthCare.Data.Model", "m", "Model-v2_final", "模型", ""] {
            let metadata = model_metadata(model);
            let segments: Vec<&str> = metadata.split('|').collect();
            assert_eq!(segments.len(), 3, "{}", model);
            assert!(segments[0].ends_with(".csdl"));
            assert!(segments[1].ends_with(".ssdl"));
            assert!(segments[2].ends_with(".msl"));
            assert!(segments.iter().all(|s| s.starts_with("res://*/")));
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        assert_eq!(model_from_metadata(&model_metadata("HealthCare.Model")).unwrap(), "HealthCare.Model");
        assert!(model_from_metadata("res://*/A.csdl|res://*/B.ssdl|res://*/A.msl").is_err());
        assert!(model_from_metadata("res://*/A.csdl|res://*/A.ssdl").is_err());
        assert!(model_from_metadata("res://*/A.ssdl|res://*/A.csdl|res://*/A.msl").is_err());
    }

    #[test]
    fn test_wraps_sql_connection_string() {
        let sql = SqlConnectionSetting::new(
            &SqlConnectionParameters::new("db01", "Sales")
                .with_credentials("app", "pw")
                .with_integrated_security(false),
        );
        let entity = EntityConnectionSetting::from_sql("SalesModel", &sql);
        assert_eq!(
            entity.connection_string(),
            "metadata=res://*/SalesModel.csdl|res://*/SalesModel.ssdl|res://*/SalesModel.msl;\
             provider=System.Data.SqlClient;\
             provider connection string=\"Data Source=db01;Initial Catalog=Sales;Integrated Security=False;User ID=app;Password=pw\""
        );
        assert_eq!(entity.provider(), ENTITY_CLIENT_PROVIDER);
        assert_eq!(entity.model_provider(), SQL_CLIENT_PROVIDER);
    }

    #[test]
    fn test_from_parameters_matches_from_sql() {
        let parameters = SqlConnectionParameters::new("", "Sales").with_multiple_active_result_sets(true);
        let direct = EntityConnectionSetting::new("M", SQL_CLIENT_PROVIDER, &parameters);
        let wrapped = EntityConnectionSetting::from_sql("M", &SqlConnectionSetting::new(&parameters));
        assert_eq!(direct, wrapped);
    }

    #[test]
    fn test_parse_round_trip() {
        let sql = SqlConnectionSetting::new(&SqlConnectionParameters::new("db01", "Sales").with_application_name("A \"B\""));
        let entity = EntityConnectionSetting::from_sql("M", &sql);
        let parsed = EntityConnectionSetting::parse(entity.connection_string()).unwrap();
        assert_eq!(parsed.model(), "M");
        assert_eq!(parsed.provider_connection_string(), sql.connection_string());
        assert_eq!(parsed.sql_setting().unwrap(), sql);
        assert_eq!(parsed, entity);
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!(matches!(
            EntityConnectionSetting::parse("metadata=res://*/M.csdl|res://*/M.ssdl|res://*/M.msl;provider=System.Data.SqlClient"),
            Err(SettingsError::MissingKeyword(_))
        ));
        assert!(EntityConnectionSetting::parse("name=MyEntities").is_err());
    }
}
