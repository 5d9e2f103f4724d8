/*!
Builders JSON pour les appareils WakeHub

Produit les corps de requête attendus par l'API (`POST /api/devices`, `PUT /api/devices/{name}`)
sans dépendre des types du kernel : on teste le format fil, pas les structs.
*/

use serde_json::{json, Map, Value};

/// Appareil simple (une seule carte réseau)
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    fields: Map<String, Value>,
}

impl DeviceBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(name.into()));
        Self { fields }
    }

    /// Appareil prêt à l'emploi : MAC valide, port 9
    pub fn valid<S: Into<String>>(name: S) -> Self {
        Self::new(name).mac("aa:bb:cc:dd:ee:ff").port(9)
    }

    pub fn set_field<S: Into<String>>(mut self, field: S, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn mac<S: Into<String>>(self, mac: S) -> Self {
        self.set_field("mac", Value::String(mac.into()))
    }

    pub fn ip<S: Into<String>>(self, ip: S) -> Self {
        self.set_field("ip", Value::String(ip.into()))
    }

    pub fn port(self, port: u16) -> Self {
        self.set_field("port", json!(port))
    }

    pub fn broadcast<S: Into<String>>(self, broadcast_ip: S) -> Self {
        self.set_field("broadcast_ip", Value::String(broadcast_ip.into()))
    }

    /// Cible le sink de test : broadcast 127.0.0.1 + port du sink
    pub fn loopback(self, port: u16) -> Self {
        self.broadcast("127.0.0.1").port(port)
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Groupe d'appareils (plusieurs cartes réveillées ensemble)
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    name: String,
    members: Vec<Value>,
    ping_mode: Option<String>,
}

impl GroupBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), members: Vec::new(), ping_mode: None }
    }

    pub fn member<S: Into<String>>(mut self, mac: S, broadcast_ip: S, port: u16) -> Self {
        self.members.push(json!({
            "mac": mac.into(),
            "ip": "",
            "port": port,
            "broadcast_ip": broadcast_ip.into(),
            "remark": format!("member {}", self.members.len() + 1),
        }));
        self
    }

    pub fn member_with_ip<S: Into<String>>(mut self, mac: S, ip: S) -> Self {
        self.members.push(json!({
            "mac": mac.into(),
            "ip": ip.into(),
            "port": 9,
            "broadcast_ip": "",
            "remark": "",
        }));
        self
    }

    pub fn ping_mode<S: Into<String>>(mut self, mode: S) -> Self {
        self.ping_mode = Some(mode.into());
        self
    }

    pub fn build(self) -> Value {
        let mut group = json!({
            "name": self.name,
            "sub_devices": self.members,
        });
        if let (Some(mode), Value::Object(obj)) = (self.ping_mode, &mut group) {
            obj.insert("ping_mode".into(), Value::String(mode));
        }
        group
    }
}
