//! Documents de description : device description et SCPD.

use xmltree::{Element, EmitterConfig, XMLNode};

use super::spec::Direction;
use super::tree::{DeviceTree, ServiceKey, ServiceNode};

/// Chemin HTTP de la description d'un device racine.
pub fn description_path(udn: &str) -> String {
    format!("/device/{}/desc.xml", udn)
}

pub fn scpd_path(key: &ServiceKey) -> String {
    format!("/device/{}/service/{}/scpd.xml", key.udn, key.short_id())
}

pub fn control_path(key: &ServiceKey) -> String {
    format!("/device/{}/service/{}/control", key.udn, key.short_id())
}

pub fn event_path(key: &ServiceKey) -> String {
    format!("/device/{}/service/{}/event", key.udn, key.short_id())
}

fn text_element(name: &str, text: impl Into<String>) -> XMLNode {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.into()));
    XMLNode::Element(elem)
}

fn spec_version(minor: &str) -> XMLNode {
    let mut spec = Element::new("specVersion");
    spec.children.push(text_element("major", "1"));
    spec.children.push(text_element("minor", minor));
    XMLNode::Element(spec)
}

fn device_element(tree: &DeviceTree, udn: &str) -> Option<Element> {
    let node = tree.device(udn)?;
    let mut elem = Element::new("device");

    elem.children.push(text_element("deviceType", node.device_type.as_str()));
    elem.children.push(text_element("friendlyName", node.friendly_name.as_str()));
    elem.children.push(text_element("manufacturer", node.manufacturer.as_str()));
    elem.children.push(text_element("modelName", node.model_name.as_str()));
    elem.children.push(text_element("UDN", format!("uuid:{}", node.udn)));

    if !node.services.is_empty() {
        let mut service_list = Element::new("serviceList");
        for key in &node.services {
            let Some(service) = tree.service(key) else {
                continue;
            };
            let mut service_elem = Element::new("service");
            service_elem
                .children
                .push(text_element("serviceType", service.service_type.as_str()));
            service_elem
                .children
                .push(text_element("serviceId", key.service_id.as_str()));
            service_elem.children.push(text_element("SCPDURL", scpd_path(key)));
            service_elem
                .children
                .push(text_element("controlURL", control_path(key)));
            service_elem
                .children
                .push(text_element("eventSubURL", event_path(key)));
            service_list.children.push(XMLNode::Element(service_elem));
        }
        elem.children.push(XMLNode::Element(service_list));
    }

    if !node.children.is_empty() {
        let mut device_list = Element::new("deviceList");
        for child in &node.children {
            if let Some(child_elem) = device_element(tree, child) {
                device_list.children.push(XMLNode::Element(child_elem));
            }
        }
        elem.children.push(XMLNode::Element(device_list));
    }

    Some(elem)
}

/// Description XML d'un device racine, `None` si l'UDN est inconnu.
///
/// Les URLs sont relatives à `base_url`, placé dans `<URLBase>`.
pub fn device_description(tree: &DeviceTree, udn: &str, base_url: &str) -> Option<String> {
    let mut root = Element::new("root");
    root.attributes.insert(
        "xmlns".to_string(),
        "urn:schemas-upnp-org:device-1-0".to_string(),
    );
    root.children.push(spec_version("1"));
    if !base_url.is_empty() {
        root.children.push(text_element("URLBase", base_url));
    }
    root.children.push(XMLNode::Element(device_element(tree, udn)?));

    write_document(&root)
}

/// Document SCPD d'un service.
pub fn scpd(service: &ServiceNode) -> Option<String> {
    let mut root = Element::new("scpd");
    root.attributes.insert(
        "xmlns".to_string(),
        "urn:schemas-upnp-org:service-1-0".to_string(),
    );
    root.children.push(spec_version("0"));

    let mut action_list = Element::new("actionList");
    for action in &service.actions {
        let mut action_elem = Element::new("action");
        action_elem.children.push(text_element("name", action.name.as_str()));

        if !action.arguments.is_empty() {
            let mut args = Element::new("argumentList");
            for arg in &action.arguments {
                let mut arg_elem = Element::new("argument");
                arg_elem.children.push(text_element("name", arg.name.as_str()));
                arg_elem
                    .children
                    .push(text_element("direction", arg.direction.as_str()));
                if arg.retval && arg.direction == Direction::Out {
                    arg_elem
                        .children
                        .push(XMLNode::Element(Element::new("retval")));
                }
                arg_elem.children.push(text_element(
                    "relatedStateVariable",
                    arg.related_state_variable.as_str(),
                ));
                args.children.push(XMLNode::Element(arg_elem));
            }
            action_elem.children.push(XMLNode::Element(args));
        }
        action_list.children.push(XMLNode::Element(action_elem));
    }
    root.children.push(XMLNode::Element(action_list));

    let mut table = Element::new("serviceStateTable");
    for var in &service.state_variables {
        let mut var_elem = Element::new("stateVariable");
        var_elem.attributes.insert(
            "sendEvents".to_string(),
            if var.send_events { "yes" } else { "no" }.to_string(),
        );
        var_elem.children.push(text_element("name", var.name.as_str()));
        var_elem
            .children
            .push(text_element("dataType", var.data_type.as_str()));
        if let Some(default) = &var.default {
            var_elem
                .children
                .push(text_element("defaultValue", default.as_str()));
        }
        if !var.allowed_values.is_empty() {
            let mut list = Element::new("allowedValueList");
            for value in &var.allowed_values {
                list.children.push(text_element("allowedValue", value.as_str()));
            }
            var_elem.children.push(XMLNode::Element(list));
        }
        if let Some(range) = &var.allowed_range {
            let mut range_elem = Element::new("allowedValueRange");
            range_elem
                .children
                .push(text_element("minimum", range.minimum.to_string()));
            range_elem
                .children
                .push(text_element("maximum", range.maximum.to_string()));
            if let Some(step) = range.step {
                range_elem.children.push(text_element("step", step.to_string()));
            }
            var_elem.children.push(XMLNode::Element(range_elem));
        }
        table.children.push(XMLNode::Element(var_elem));
    }
    root.children.push(XMLNode::Element(table));

    write_document(&root)
}

fn write_document(root: &Element) -> Option<String> {
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");

    let mut buf = Vec::new();
    if let Err(e) = root.write_with_config(&mut buf, config) {
        tracing::error!("Failed to serialize description XML: {}", e);
        return None;
    }
    String::from_utf8(buf).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ActionSpec, AllowedRange, DataType, DeviceSpec, ServiceSpec, StateVariableSpec,
    };

    fn tree() -> DeviceTree {
        let tree = DeviceTree::new();
        let service = ServiceSpec::new(
            "urn:schemas-upnp-org:service:RenderingControl:1",
            "urn:upnp-org:serviceId:RenderingControl",
        )
        .variable(
            StateVariableSpec::new("Volume", DataType::Ui2)
                .evented()
                .range(AllowedRange::new(0.0, 100.0).with_step(1.0)),
        )
        .variable(StateVariableSpec::new("A_ARG_TYPE_Channel", DataType::String).allowed(&["Master"]))
        .action(
            ActionSpec::new("GetVolume")
                .input("Channel", "A_ARG_TYPE_Channel")
                .retval("CurrentVolume", "Volume"),
        );

        tree.add_root(
            DeviceSpec::new("uuid:abc", "urn:schemas-upnp-org:device:MediaRenderer:1", "Salon")
                .manufacturer("dlnad")
                .service(service)
                .device(DeviceSpec::new("def", "urn:schemas-upnp-org:device:Basic:1", "Inner")),
        )
        .unwrap();
        tree
    }

    #[test]
    fn test_device_description() {
        let tree = tree();
        let xml = device_description(&tree, "abc", "http://10.0.0.1:8200").unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<root xmlns="urn:schemas-upnp-org:device-1-0">"#));
        assert!(xml.contains("<UDN>uuid:abc</UDN>"));
        assert!(xml.contains("<URLBase>http://10.0.0.1:8200</URLBase>"));
        assert!(xml.contains(
            "<controlURL>/device/abc/service/RenderingControl/control</controlURL>"
        ));
        assert!(xml.contains("<deviceList>"));
        assert!(xml.contains("<UDN>uuid:def</UDN>"));

        assert!(device_description(&tree, "nope", "").is_none());
    }

    #[test]
    fn test_scpd() {
        let tree = tree();
        let service = tree.find_service("abc", "RenderingControl").unwrap();
        let xml = scpd(&service).unwrap();

        assert!(xml.contains(r#"<stateVariable sendEvents="yes">"#));
        assert!(xml.contains(r#"<stateVariable sendEvents="no">"#));
        assert!(xml.contains("<allowedValue>Master</allowedValue>"));
        assert!(xml.contains("<maximum>100</maximum>"));
        assert!(xml.contains("<retval />") || xml.contains("<retval/>"));
        assert!(xml.contains("<direction>in</direction>"));
    }
}
