//! The XML deserializer.
//!
//! Walks a `<net>` document: reads every `<layer>` into a parameter
//! record, groups `<edge>`s by target layer, orders layers by an
//! outputs-backward DFS, then materializes each operator through the
//! opset registry and the attribute visitor protocol, wiring inputs by
//! positional port index. Assign/ReadValue pairs are closed with a
//! control dependency in a post-pass, so the graph stays acyclic on the
//! data plane.

use crate::xml::{self, XmlNode};
use xir_core::internal::*;
use xir_core::ops::framework::{FrameworkNode, FrameworkNodeAttrs};
use xir_core::ops::konst::Constant;
use xir_core::ops::nn::{TopKMode, TopKSort};
use xir_core::ops::scan::{InputDescription, OutputDescription, SpecialBodyPorts};
use xir_core::ops::state::{Assign, ReadValue};
use xir_core::ops::{io, AttrKind, AttrValue};

/// Positional indices of a body's Parameter and Result layers, keyed by
/// layer id. `-1` marks a layer seen in the body XML but not (yet)
/// constructed.
#[derive(Clone, Debug, Default)]
pub struct IoMaps {
    pub inputs: HashMap<u64, i64>,
    pub outputs: HashMap<u64, i64>,
}

/// One declared port of a layer.
#[derive(Clone, Debug)]
pub struct LayerPort {
    pub id: u64,
    pub dims: TVec<i64>,
    pub element_type: ElementType,
    pub names: HashSet<String>,
}

/// The generic parameter record of one `<layer>`.
#[derive(Clone, Debug)]
pub struct LayerParams {
    pub layer_id: u64,
    pub version: String,
    pub type_name: String,
    pub name: String,
    pub input_ports: TVec<LayerPort>,
    pub output_ports: TVec<LayerPort>,
}

impl LayerParams {
    /// Positional index of the input port declared with `port_id`. The
    /// declared id is opaque; all wiring uses the declaration rank.
    pub fn real_input_port_index(&self, port_id: u64) -> XirResult<usize> {
        self.input_ports.iter().position(|p| p.id == port_id).ok_or_else(|| {
            IrError::InconsistentPortCount(format!(
                "no input port with id {} on layer \"{}\"",
                port_id, self.name
            ))
            .into()
        })
    }

    pub fn real_output_port_index(&self, port_id: u64) -> XirResult<usize> {
        self.output_ports.iter().position(|p| p.id == port_id).ok_or_else(|| {
            IrError::InconsistentPortCount(format!(
                "no output port with id {} on layer \"{}\"",
                port_id, self.name
            ))
            .into()
        })
    }
}

struct Edge {
    from_layer: u64,
    from_port: u64,
    to_port: u64,
}

fn parse_port(port: XmlNode, input: bool) -> XirResult<LayerPort> {
    let id = xml::attr_parse(port, "id")?;
    let mut dims = tvec!();
    for dim in xml::children(port, "dim") {
        dims.push(xml::parse_dim(dim.text().unwrap_or(""))?);
    }
    // Input ports carry no precision.
    let element_type = if input {
        ElementType::Dynamic
    } else {
        let precision = xml::require_attr(port, "precision")?;
        ElementType::parse(precision)
            .ok_or_else(|| IrError::MalformedXml(format!("unknown precision \"{precision}\"")))?
    };
    let names = match xml::attr_str(port, "names") {
        Some(s) => xml::split_names(s).into_iter().collect(),
        None => HashSet::new(),
    };
    Ok(LayerPort { id, dims, element_type, names })
}

pub fn parse_layer_params(layer: XmlNode) -> XirResult<LayerParams> {
    let layer_id = xml::attr_parse(layer, "id")?;
    let version = xml::require_attr(layer, "version")?.to_string();
    let type_name = xml::require_attr(layer, "type")?.to_string();
    let name = xml::require_attr(layer, "name")?.to_string();
    let mut input_ports = tvec!();
    let mut output_ports = tvec!();
    if let Some(inputs) = xml::child(layer, "input") {
        for port in xml::children(inputs, "port") {
            input_ports.push(parse_port(port, true)?);
        }
    }
    if let Some(outputs) = xml::child(layer, "output") {
        for port in xml::children(outputs, "port") {
            output_ports.push(parse_port(port, false)?);
        }
    }
    Ok(LayerParams { layer_id, version, type_name, name, input_ports, output_ports })
}

fn declared_output_facts(params: &LayerParams) -> TVec<PortFact> {
    params
        .output_ports
        .iter()
        .map(|p| PortFact::new(p.element_type, PartialShape::new(p.dims.iter().copied())))
        .collect()
}

const EXPERIMENTAL_TYPES: [&str; 8] = [
    "ExperimentalDetectronDetectionOutput",
    "ExperimentalDetectronGenerateProposalsSingleImage",
    "ExperimentalDetectronPriorGridGenerator",
    "ExperimentalDetectronROIFeatureExtractor",
    "ExperimentalDetectronTopKROIs",
    "GRUCell",
    "RNNCell",
    "Proposal",
];

/// One conversion in flight. The deserializer doubles as the attribute
/// visitor for the layer it is currently looking at; sub-graph bodies and
/// per-layer attribute visits run on nested deserializers sharing the
/// opsets and the variables table.
pub struct XmlDeserializer<'a, 'i, 'v> {
    node: XmlNode<'a, 'i>,
    weights: Weights,
    opsets: &'a OpsetRegistry,
    variables: &'v mut HashMap<String, Arc<Variable>>,
    io_map: IoMaps,
    use_framework_node: bool,
}

impl<'a, 'i, 'v> XmlDeserializer<'a, 'i, 'v> {
    pub fn new(
        node: XmlNode<'a, 'i>,
        weights: Weights,
        opsets: &'a OpsetRegistry,
        variables: &'v mut HashMap<String, Arc<Variable>>,
        use_framework_node: bool,
    ) -> XmlDeserializer<'a, 'i, 'v> {
        XmlDeserializer {
            node,
            weights,
            opsets,
            variables,
            io_map: IoMaps::default(),
            use_framework_node,
        }
    }

    fn data(&self) -> Option<XmlNode<'a, 'i>> {
        xml::child(self.node, "data")
    }

    fn data_attr(&self, name: &str) -> Option<&'a str> {
        self.data().and_then(|d| d.attribute(name))
    }

    /// Parse a `<net>` or `<body>` element into a Function.
    pub fn parse_function(&mut self, root: XmlNode<'a, 'i>) -> XirResult<Function> {
        let mut layers: HashMap<u64, (XmlNode<'a, 'i>, LayerParams)> = HashMap::new();
        let mut outputs: Vec<u64> = vec![];
        let mut names_seen: HashSet<String> = HashSet::new();
        if let Some(layers_node) = xml::child(root, "layers") {
            for layer in xml::children(layers_node, "layer") {
                let params = parse_layer_params(layer)?;
                if !names_seen.insert(params.name.clone()) && params.type_name != "Result" {
                    bail!(IrError::DuplicateName(params.name.clone()));
                }
                if params.type_name == "Result" || params.type_name == "Assign" {
                    outputs.push(params.layer_id);
                }
                layers.insert(params.layer_id, (layer, params));
            }
        }

        let mut edges: HashMap<u64, Vec<Edge>> = HashMap::new();
        if let Some(edges_node) = xml::child(root, "edges") {
            for edge in xml::children(edges_node, "edge") {
                let from_layer = xml::attr_parse(edge, "from-layer")?;
                let from_port = xml::attr_parse(edge, "from-port")?;
                let to_layer: u64 = xml::attr_parse(edge, "to-layer")?;
                let to_port = xml::attr_parse(edge, "to-port")?;
                edges.entry(to_layer).or_default().push(Edge { from_layer, from_port, to_port });
            }
        }

        // Outputs-backward DFS, predecessors in edge document order,
        // post-order emission. The visited guard makes a data cycle
        // surface later as a missing predecessor, not a hang.
        let mut order: Vec<u64> = vec![];
        let mut visited: HashSet<u64> = HashSet::new();
        for &seed in &outputs {
            if !visited.insert(seed) {
                continue;
            }
            let mut stack: Vec<(u64, usize)> = vec![(seed, 0)];
            while let Some(frame) = stack.last_mut() {
                let id = frame.0;
                let preds = edges.get(&id).map(|e| e.as_slice()).unwrap_or(&[]);
                if frame.1 < preds.len() {
                    let next = preds[frame.1].from_layer;
                    frame.1 += 1;
                    if visited.insert(next) {
                        stack.push((next, 0));
                    }
                } else {
                    order.push(id);
                    stack.pop();
                }
            }
        }

        let mut function = Function {
            name: xml::attr_str(root, "name").unwrap_or("").to_string(),
            ..Function::default()
        };
        let mut id_to_node: HashMap<u64, usize> = HashMap::new();
        let mut variable_id_to_read_value: HashMap<String, usize> = HashMap::new();

        for layer_id in order {
            let (layer_xml, params) = layers.get(&layer_id).ok_or_else(|| {
                IrError::DanglingEdge(format!("edge references unknown layer {layer_id}"))
            })?;

            let layer_edges = edges.get(&layer_id).map(|e| e.as_slice()).unwrap_or(&[]);
            let mut inputs: Vec<Option<OutletId>> = vec![None; layer_edges.len()];
            for edge in layer_edges {
                let src = *id_to_node.get(&edge.from_layer).ok_or_else(|| {
                    IrError::DanglingEdge(format!(
                        "attempt to access node {} that is not in graph",
                        edge.from_layer
                    ))
                })?;
                let src_params = &layers[&edge.from_layer].1;
                let to_slot = params.real_input_port_index(edge.to_port)?;
                if to_slot >= inputs.len() {
                    bail!(IrError::InconsistentPortCount(format!(
                        "{} layer \"{}\" with id {} is inconsistent",
                        params.type_name, params.name, params.layer_id
                    )));
                }
                let from_slot = src_params.real_output_port_index(edge.from_port)?;
                inputs[to_slot] = Some(OutletId::new(src, from_slot));
            }
            let inputs = inputs
                .into_iter()
                .enumerate()
                .map(|(ix, input)| {
                    input.ok_or_else(|| {
                        IrError::DanglingEdge(format!(
                            "{} layer \"{}\" with id {} has incorrect input with index {}",
                            params.type_name, params.name, params.layer_id, ix
                        ))
                        .into()
                    })
                })
                .collect::<XirResult<Vec<OutletId>>>()?;

            let node_id = self.create_node(&mut function, *layer_xml, params, inputs)?;
            id_to_node.insert(layer_id, node_id);

            if function.node(node_id).op_is::<io::Parameter>() {
                self.io_map.inputs.insert(layer_id, function.parameters.len() as i64);
                function.parameters.push(node_id);
            }
            if function.node(node_id).op_is::<io::Result_>() {
                self.io_map.outputs.insert(layer_id, function.results.len() as i64);
                function.results.push(node_id);
            }
            if function.node(node_id).op().is_sink() {
                function.sinks.push(node_id);
            }
            if let Some(read_value) = function.node(node_id).op_as::<ReadValue>() {
                if let Some(variable_id) = read_value.variable_id() {
                    variable_id_to_read_value.insert(variable_id.to_string(), node_id);
                }
            }
        }

        for sink in function.sinks.clone() {
            let Some(assign) = function.node(sink).op_as::<Assign>() else { continue };
            let variable_id = assign
                .variable_id()
                .ok_or_else(|| IrError::UndefinedVariable("Assign with no variable_id".into()))?
                .to_string();
            let read_value = *variable_id_to_read_value.get(&variable_id).ok_or_else(|| {
                IrError::UndefinedVariable(format!(
                    "Assign references variable \"{variable_id}\" that is never read"
                ))
            })?;
            function.add_control_edge(sink, read_value);
        }

        Ok(function)
    }

    fn create_node(
        &mut self,
        function: &mut Function,
        layer_xml: XmlNode<'a, 'i>,
        params: &LayerParams,
        inputs: Vec<OutletId>,
    ) -> XirResult<usize> {
        trace!("creating node \"{}\" ({} {})", params.name, params.version, params.type_name);
        let unsupported_opset = || {
            IrError::UnknownOpset(format!(
                "cannot create {} layer \"{}\" id {} from unsupported opset {}",
                params.type_name, params.name, params.layer_id, params.version
            ))
        };

        let mut opset = self.opsets.get(&params.version);
        if EXPERIMENTAL_TYPES.contains(&params.type_name.as_str())
            && (params.version == "experimental" || params.version == "extension")
        {
            debug!("remapping {} from {} to opset6", params.type_name, params.version);
            opset = self.opsets.get("opset6");
        }

        let input_facts = inputs
            .iter()
            .map(|o| function.outlet_fact(*o).cloned())
            .collect::<XirResult<TVec<PortFact>>>()?;

        let (op, output_facts): (Box<dyn Op>, TVec<PortFact>) = if let Some(mut opset) = opset {
            let type_name: &str =
                if params.type_name == "Const" { "Constant" } else { &params.type_name };
            // MVN, ROIPooling and ReorgYolo were missing in opset1.
            if params.version == "opset1"
                && matches!(type_name, "MVN" | "ROIPooling" | "ReorgYolo")
            {
                opset = self.opsets.get("opset2").ok_or_else(unsupported_opset)?;
            }
            let mut op = opset.create(type_name).ok_or_else(|| {
                IrError::UnknownOperator(format!(
                    "opset {} does not contain the operation with type {}",
                    params.version, type_name
                ))
            })?;
            // Constants must share the weights blob, not copy it.
            if let Some(constant) = op.downcast_mut::<Constant>() {
                constant.alloc_buffer_on_visit_attributes(false);
            }
            let mut visitor = XmlDeserializer {
                node: layer_xml,
                weights: self.weights.clone(),
                opsets: self.opsets,
                variables: &mut *self.variables,
                io_map: IoMaps::default(),
                use_framework_node: self.use_framework_node,
            };
            let facts = if op.visit_attributes(&mut visitor)? {
                op.infer(&input_facts).with_context(|| {
                    format!("inferring types for layer \"{}\" ({type_name})", params.name)
                })?
            } else {
                declared_output_facts(params)
            };
            (op, facts)
        } else if self.use_framework_node {
            debug!(
                "falling back to a framework node for \"{}\" ({} {})",
                params.name, params.version, params.type_name
            );
            let mut op = FrameworkNode { output_facts: declared_output_facts(params), ..Default::default() };
            let mut visitor = XmlDeserializer {
                node: layer_xml,
                weights: self.weights.clone(),
                opsets: self.opsets,
                variables: &mut *self.variables,
                io_map: IoMaps::default(),
                use_framework_node: self.use_framework_node,
            };
            op.visit_attributes(&mut visitor)?;
            let facts = op.output_facts.clone();
            (Box::new(op), facts)
        } else {
            bail!(unsupported_opset())
        };

        let node_id = function.add_node(&params.name, op, output_facts);
        for (slot, outlet) in inputs.into_iter().enumerate() {
            function.add_edge(outlet, InletId::new(node_id, slot))?;
        }

        let node = function.node_mut(node_id);
        if let Some(data) = xml::child(layer_xml, "data") {
            for key in ["PrimitivesPriority", "alt_width"] {
                if let Some(value) = data.attribute(key) {
                    node.rt_info.insert(key.to_string(), value.to_string());
                }
            }
        }
        for (ix, port) in params.output_ports.iter().enumerate() {
            if ix >= node.outputs.len() {
                break;
            }
            if !port.names.is_empty() {
                node.outputs[ix].names = port.names.clone();
            }
        }

        Ok(node_id)
    }

    /// Io maps of the current layer's `<body>`, extended with sentinel
    /// entries for Parameter/Result layers the construction never reached.
    fn updated_io_map(&self) -> XirResult<IoMaps> {
        let body = xml::child(self.node, "body")
            .ok_or_else(|| IrError::MissingBody("missing body part".into()))?;
        let mut io_map = self.io_map.clone();
        if let Some(layers) = xml::child(body, "layers") {
            for layer in xml::children(layers, "layer") {
                let type_name = xml::require_attr(layer, "type")?;
                if type_name == "Parameter" {
                    io_map.inputs.entry(xml::attr_parse(layer, "id")?).or_insert(-1);
                } else if type_name == "Result" {
                    io_map.outputs.entry(xml::attr_parse(layer, "id")?).or_insert(-1);
                }
            }
        }
        Ok(io_map)
    }

    fn body_index(map: &HashMap<u64, i64>, layer_id: u64, what: &str) -> XirResult<usize> {
        let index = *map.get(&layer_id).ok_or_else(|| {
            IrError::MalformedXml(format!("port_map references unknown body {what} {layer_id}"))
        })?;
        ensure!(
            index >= 0,
            IrError::DanglingEdge(format!("body {what} {layer_id} was never constructed"))
        );
        Ok(index as usize)
    }

    /// `<port_map>` inputs, reordered by ascending `external_port_id`.
    fn parse_input_descriptions(&self) -> XirResult<Vec<InputDescription>> {
        let io_map = self.updated_io_map()?;
        let mut input_map: BTreeMap<i64, XmlNode> = BTreeMap::new();
        if let Some(port_map) = xml::child(self.node, "port_map") {
            for input in xml::children(port_map, "input") {
                input_map.insert(xml::attr_parse(input, "external_port_id")?, input);
            }
        }

        let mut descriptions = vec![];
        for (&external_port_id, &input) in &input_map {
            let internal_layer_id: u64 = xml::attr_parse(input, "internal_layer_id")?;
            if xml::attr_str(input, "axis").is_some() {
                // Axis set: the input is sliced. This wins over a back
                // edge on the same parameter.
                descriptions.push(InputDescription::Slice {
                    external_port_id,
                    body_parameter_index: Self::body_index(
                        &io_map.inputs,
                        internal_layer_id,
                        "parameter",
                    )?,
                    start: xml::attr_opt_parse(input, "start", 0)?,
                    stride: xml::attr_opt_parse(input, "stride", 1)?,
                    part_size: xml::attr_opt_parse(input, "part_size", 1)?,
                    end: xml::attr_opt_parse(input, "end", -1)?,
                    axis: xml::attr_parse(input, "axis")?,
                });
                continue;
            }
            let mut back_edge = None;
            if let Some(back_edges) = xml::child(self.node, "back_edges") {
                for edge in xml::children(back_edges, "edge") {
                    let to_layer: u64 = xml::attr_parse(edge, "to-layer")?;
                    if to_layer == internal_layer_id {
                        back_edge = Some(xml::attr_parse::<u64>(edge, "from-layer")?);
                        break;
                    }
                }
            }
            if let Some(from_layer) = back_edge {
                descriptions.push(InputDescription::Merged {
                    external_port_id,
                    body_parameter_index: Self::body_index(
                        &io_map.inputs,
                        internal_layer_id,
                        "parameter",
                    )?,
                    body_result_index: Self::body_index(&io_map.outputs, from_layer, "result")?,
                });
            } else if external_port_id >= 0 {
                descriptions.push(InputDescription::Invariant {
                    external_port_id,
                    body_parameter_index: Self::body_index(
                        &io_map.inputs,
                        internal_layer_id,
                        "parameter",
                    )?,
                });
            }
            // A negative external port id with no back edge: the body
            // parameter is internal only, nothing to describe.
        }
        Ok(descriptions)
    }

    /// `<port_map>` outputs, reordered by ascending `external_port_id`.
    /// Negative external ports are internal-only body results: skipped,
    /// and they do not advance the output numbering.
    fn parse_output_descriptions(&self) -> XirResult<Vec<OutputDescription>> {
        let io_map = self.updated_io_map()?;
        let mut output_map: BTreeMap<i64, XmlNode> = BTreeMap::new();
        if let Some(port_map) = xml::child(self.node, "port_map") {
            for output in xml::children(port_map, "output") {
                output_map.insert(xml::attr_parse(output, "external_port_id")?, output);
            }
        }

        let mut descriptions = vec![];
        let mut output_number = 0;
        for (&external_port_id, &output) in &output_map {
            if external_port_id < 0 {
                continue;
            }
            let internal_layer_id: u64 = xml::attr_parse(output, "internal_layer_id")?;
            let body_result_index =
                Self::body_index(&io_map.outputs, internal_layer_id, "result")?;
            if xml::attr_str(output, "axis").is_some() {
                descriptions.push(OutputDescription::Concat {
                    body_result_index,
                    output_index: output_number,
                    start: xml::attr_opt_parse(output, "start", 0)?,
                    stride: xml::attr_opt_parse(output, "stride", 1)?,
                    part_size: xml::attr_opt_parse(output, "part_size", 1)?,
                    end: xml::attr_opt_parse(output, "end", -1)?,
                    axis: xml::attr_parse(output, "axis")?,
                });
            } else {
                descriptions.push(OutputDescription::Body {
                    body_result_index,
                    output_index: output_number,
                    iteration: -1,
                });
            }
            output_number += 1;
        }
        Ok(descriptions)
    }

    fn parse_special_body_ports(&self) -> XirResult<SpecialBodyPorts> {
        let io_map = self.updated_io_map()?;
        ensure!(
            !io_map.inputs.is_empty() || !io_map.outputs.is_empty(),
            IrError::MalformedXml("no parameters or results found in body function".into())
        );
        let mut result = SpecialBodyPorts::default();
        if let Some(port_map) = xml::child(self.node, "port_map") {
            for input in xml::children(port_map, "input") {
                if xml::attr_str(input, "purpose") == Some("current_iteration") {
                    let internal_layer_id: u64 = xml::attr_parse(input, "internal_layer_id")?;
                    result.current_iteration_input_idx =
                        Self::body_index(&io_map.inputs, internal_layer_id, "parameter")? as i64;
                }
            }
            for output in xml::children(port_map, "output") {
                if xml::attr_str(output, "purpose") == Some("execution_condition") {
                    let internal_layer_id: u64 = xml::attr_parse(output, "internal_layer_id")?;
                    result.body_condition_output_idx =
                        Self::body_index(&io_map.outputs, internal_layer_id, "result")? as i64;
                }
            }
        }
        Ok(result)
    }

    fn fetch_buffer(&mut self, name: &str) -> XirResult<Option<AttrValue>> {
        let type_name = xml::require_attr(self.node, "type")?;
        let data = self.data().ok_or_else(|| {
            IrError::MalformedXml(format!("no attributes defined for {type_name} op"))
        })?;
        if let Some(value) = data.attribute(name) {
            // Inline string payload: an owning copy.
            return Ok(Some(AttrValue::Buffer(AlignedBuffer::Owned(value.as_bytes().to_vec()))));
        }
        if name != "value" || type_name != "Const" {
            return Ok(None);
        }
        let offset: u64 = xml::attr_parse(data, "offset")?;
        let size: u64 = xml::attr_parse(data, "size")?;
        let Some(element_type) = data.attribute("element_type") else { return Ok(None) };
        let Some(shape) = data.attribute("shape") else { return Ok(None) };
        let element_type = ElementType::parse(element_type).ok_or_else(|| {
            IrError::MalformedXml(format!("unknown precision \"{element_type}\""))
        })?;
        let shape: Vec<u64> = xml::split_list(shape, "shape")?;
        let volume: u64 = shape.iter().product();
        if self.weights.is_empty() {
            bail!(IrError::InsufficientWeights(
                "empty weights data in bin file or bin file cannot be found".into()
            ));
        }
        if size < element_type.byte_size_for(volume) {
            bail!(IrError::InconsistentWeightSize(format!(
                "attribute and shape size are inconsistent for {type_name} op"
            )));
        }
        let buffer = self.weights.slice(offset as usize, size as usize)?;
        Ok(Some(AttrValue::Buffer(buffer)))
    }

    fn fetch_function(&mut self, name: &str) -> XirResult<Option<AttrValue>> {
        let function = match name {
            "body" => {
                let body = xml::child(self.node, "body").ok_or_else(|| {
                    IrError::MissingBody(format!(
                        "{} has no body",
                        xml::attr_str(self.node, "type").unwrap_or("sub-graph operator")
                    ))
                })?;
                self.parse_function(body)?
            }
            "net" => self.parse_function(self.node)?,
            _ => bail!(IrError::UnknownAttribute(format!(
                "not recognized function attribute: {name}"
            ))),
        };
        Ok(Some(AttrValue::Function(function)))
    }

    fn fetch_framework_attrs(&self) -> XirResult<Option<AttrValue>> {
        let mut attrs = FrameworkNodeAttrs {
            type_name: xml::require_attr(self.node, "type")?.to_string(),
            opset_name: xml::require_attr(self.node, "version")?.to_string(),
            attrs: HashMap::new(),
        };
        if let Some(data) = self.data() {
            for attr in data.attributes() {
                attrs.attrs.insert(attr.name().to_string(), attr.value().to_string());
            }
        }
        Ok(Some(AttrValue::FrameworkAttrs(attrs)))
    }
}

impl AttributeVisitor for XmlDeserializer<'_, '_, '_> {
    fn fetch(&mut self, name: &str, kind: AttrKind) -> XirResult<Option<AttrValue>> {
        // Sub-graph descriptors never come from <data>; they are derived
        // from the port map.
        match kind {
            AttrKind::InputDescriptions => {
                return if xml::child(self.node, "port_map").is_some() {
                    Ok(Some(AttrValue::InputDescriptions(self.parse_input_descriptions()?)))
                } else {
                    Ok(None)
                };
            }
            AttrKind::OutputDescriptions => {
                return if xml::child(self.node, "port_map").is_some() {
                    Ok(Some(AttrValue::OutputDescriptions(self.parse_output_descriptions()?)))
                } else {
                    Ok(None)
                };
            }
            AttrKind::SpecialBodyPorts => {
                return if xml::child(self.node, "port_map").is_some() {
                    Ok(Some(AttrValue::SpecialBodyPorts(self.parse_special_body_ports()?)))
                } else {
                    Ok(None)
                };
            }
            AttrKind::Function => return self.fetch_function(name),
            AttrKind::FrameworkAttrs => return self.fetch_framework_attrs(),
            AttrKind::Buffer => return self.fetch_buffer(name),
            AttrKind::Variable => {
                let Some(variable_id) = self.data_attr(name) else { return Ok(None) };
                let variable = self
                    .variables
                    .entry(variable_id.to_string())
                    .or_insert_with(|| Arc::new(Variable::dynamic(variable_id)))
                    .clone();
                return Ok(Some(AttrValue::Variable(variable)));
            }
            _ => (),
        }

        let Some(value) = self.data_attr(name) else { return Ok(None) };
        let attr = match kind {
            AttrKind::Str => AttrValue::Str(value.to_string()),
            AttrKind::Bool => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => AttrValue::Bool(true),
                "false" | "0" => AttrValue::Bool(false),
                // Unrecognized spellings keep the operator default.
                _ => return Ok(None),
            },
            AttrKind::I64 => AttrValue::I64(
                value.trim().parse().map_err(|_| {
                    IrError::MalformedXml(format!("cannot parse \"{value}\" for \"{name}\""))
                })?,
            ),
            AttrKind::F64 => AttrValue::F64(
                value.trim().parse().map_err(|_| {
                    IrError::MalformedXml(format!("cannot parse \"{value}\" for \"{name}\""))
                })?,
            ),
            AttrKind::VecI32 => AttrValue::VecI32(xml::split_list(value, name)?),
            AttrKind::VecI64 => AttrValue::VecI64(xml::split_list(value, name)?),
            AttrKind::VecF32 => AttrValue::VecF32(xml::split_list(value, name)?),
            AttrKind::VecStr => AttrValue::VecStr(xml::split_list(value, name)?),
            AttrKind::ElementType => AttrValue::ElementType(
                ElementType::parse(value).ok_or_else(|| {
                    IrError::MalformedXml(format!("unknown precision \"{value}\""))
                })?,
            ),
            AttrKind::PartialShape => {
                let dims: Vec<i64> = xml::split_list(value, name)?;
                AttrValue::PartialShape(PartialShape::new(dims))
            }
            AttrKind::Shape => {
                AttrValue::Shape(xml::split_list::<u64>(value, name)?.into_iter().collect())
            }
            AttrKind::Strides => {
                AttrValue::Strides(xml::split_list::<u64>(value, name)?.into_iter().collect())
            }
            AttrKind::AxisSet => {
                AttrValue::AxisSet(xml::split_list::<u64>(value, name)?.into_iter().collect())
            }
            AttrKind::CoordinateDiff => AttrValue::CoordinateDiff(
                xml::split_list::<i64>(value, name)?.into_iter().collect(),
            ),
            AttrKind::TopKMode => match TopKMode::parse(value.trim()) {
                Some(mode) => AttrValue::TopKMode(mode),
                None => return Ok(None),
            },
            AttrKind::TopKSort => match TopKSort::parse(value.trim()) {
                Some(sort) => AttrValue::TopKSort(sort),
                None => return Ok(None),
            },
            AttrKind::TypeVec => AttrValue::TypeVec(
                value
                    .split(',')
                    .map(|t| {
                        ElementType::parse(t.trim()).ok_or_else(|| {
                            IrError::MalformedXml(format!("unknown precision \"{t}\"")).into()
                        })
                    })
                    .collect::<XirResult<Vec<ElementType>>>()?,
            ),
            AttrKind::InputDescriptions
            | AttrKind::OutputDescriptions
            | AttrKind::SpecialBodyPorts
            | AttrKind::Function
            | AttrKind::FrameworkAttrs
            | AttrKind::Buffer
            | AttrKind::Variable => unreachable!("handled above"),
        };
        Ok(Some(attr))
    }
}
