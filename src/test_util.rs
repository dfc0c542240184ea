//! In memory PMX writer for unit tests.

use crate::types::*;
use std::io::Cursor;

pub(crate) struct PmxBuilder {
    pub utf8: bool,
    pub name: String,
    pub additional_uv: u8,
    pub vertex_index_size: u8,
    pub bone_index_size: u8,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<usize>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub frames: Vec<Frame>,
    pub rigid_bodies: Vec<Rigid>,
    pub joints: Vec<Joint>,
}

impl PmxBuilder {
    pub fn new() -> Self {
        Self {
            utf8: false,
            name: "model".to_owned(),
            additional_uv: 0,
            vertex_index_size: 4,
            bone_index_size: 4,
            vertices: vec![],
            indices: vec![],
            textures: vec![],
            materials: vec![],
            bones: vec![],
            morphs: vec![],
            frames: vec![],
            rigid_bodies: vec![],
            joints: vec![],
        }
    }

    /// one triangle, one material, one bone
    pub fn triangle_model(mut self) -> Self {
        self.bones.push(Self::bone("center", None));
        self.vertex([0.0, 0.0, 0.0]);
        self.vertex([1.0, 0.0, 0.0]);
        self.vertex([0.0, 1.0, 0.0]);
        self.indices = vec![0, 1, 2];
        self.materials.push(Self::material("body", 3));
        self
    }

    pub fn vertex(&mut self, position: Vec3) -> usize {
        self.vertex_with_weight(VertexWeight::BDEF1(Some(0)));
        let last = self.vertices.len() - 1;
        self.vertices[last].position = position;
        last
    }

    pub fn vertex_with_weight(&mut self, weight_type: VertexWeight) {
        self.vertices.push(Vertex {
            position: [0.0; 3],
            norm: [0.0, 1.0, 0.0],
            uv: [0.0; 2],
            add_uv: [[0.0; 4]; 4],
            weight_type,
            edge_mag: 1.0,
        });
    }

    /// appends a grid of disjoint triangles using fresh vertices
    pub fn disjoint_triangles(&mut self, material: &str, count: usize) {
        for _ in 0..count {
            for _ in 0..3 {
                let v = self.vertex([0.0; 3]);
                self.indices.push(v);
            }
        }
        self.materials.push(Self::material(material, count * 3));
    }

    pub fn bone(name: &str, parent: Option<usize>) -> Bone {
        Bone {
            name: name.to_owned(),
            english_name: String::new(),
            parent,
            flags: BoneFlags::ROTATABLE | BoneFlags::IS_VISIBLE | BoneFlags::ENABLED,
            connection_display_mode: ConnectionDisplayMode::Offset([0.0; 3]),
            ..Bone::default()
        }
    }

    pub fn material(name: &str, num_face_vertices: usize) -> Material {
        Material {
            name: name.to_owned(),
            english_name: String::new(),
            diffuse: [1.0; 4],
            specular: [0.0; 3],
            specular_factor: 5.0,
            ambient: [0.5; 3],
            draw_mode: MaterialFlags::GROUND_SHADOW | MaterialFlags::DRAW_SHADOW,
            edge_color: [0.0, 0.0, 0.0, 1.0],
            edge_size: 1.0,
            texture_index: None,
            sphere_mode: None,
            toon_mode: ToonMode::Common(0),
            memo: String::new(),
            num_face_vertices,
        }
    }

    pub fn rigid(name: &str, bone_index: Option<usize>, calc_method: RigidCalcMethod) -> Rigid {
        Rigid {
            name: name.to_owned(),
            name_en: String::new(),
            bone_index,
            group: 0,
            un_collision_group_flag: 0,
            form: RigidForm::Sphere,
            size: [1.0, 1.0, 1.0],
            position: [0.0; 3],
            rotation: [0.0; 3],
            mass: 1.0,
            move_resist: 0.5,
            rotation_resist: 0.5,
            repulsion: 0.0,
            friction: 0.5,
            calc_method,
        }
    }

    pub fn joint(name: &str, a_rigid_index: usize, b_rigid_index: usize) -> Joint {
        Joint {
            name: name.to_owned(),
            name_en: String::new(),
            kind: JointKind::Spring6DOF,
            a_rigid_index,
            b_rigid_index,
            position: [0.0; 3],
            rotation: [0.0; 3],
            move_limit_down: [0.0; 3],
            move_limit_up: [0.0; 3],
            rotation_limit_down: [0.0; 3],
            rotation_limit_up: [0.0; 3],
            spring_const_move: [0.0; 3],
            spring_const_rotation: [0.0; 3],
        }
    }

    pub fn morph(name: &str, morph_data: MorphKinds) -> Morph {
        Morph {
            name: name.to_owned(),
            english_name: String::new(),
            control_panel: ControlPanel::BottomRight,
            morph_data,
        }
    }

    pub fn document(&self) -> Document {
        Document::read(Cursor::new(self.build())).unwrap()
    }

    /// byte offset of the weight method tag of the first vertex
    pub fn first_weight_tag_offset(&self) -> usize {
        let header = 4 + 4 + 1 + 8;
        let names: usize = [self.name.as_str(), "", "", ""]
            .iter()
            .map(|s| 4 + self.text_bytes(s).len())
            .sum();
        header + names + 4 + 8 * 4 + 16 * usize::from(self.additional_uv)
    }

    fn text_bytes(&self, s: &str) -> Vec<u8> {
        if self.utf8 {
            s.as_bytes().to_vec()
        } else {
            s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer {
            out: vec![],
            builder: self,
        };
        w.out.extend_from_slice(b"PMX ");
        w.f32(2.0);
        w.u8(8);
        w.out.extend_from_slice(&[
            if self.utf8 { 1 } else { 0 },
            self.additional_uv,
            self.vertex_index_size,
            4,
            4,
            self.bone_index_size,
            4,
            4,
        ]);
        w.text(&self.name);
        w.text("");
        w.text("");
        w.text("");

        w.count(self.vertices.len());
        for v in &self.vertices {
            w.vec(&v.position);
            w.vec(&v.norm);
            w.vec(&v.uv);
            for uv in v.add_uv.iter().take(usize::from(self.additional_uv)) {
                w.vec(uv);
            }
            w.u8(v.weight_type.tag());
            match v.weight_type {
                VertexWeight::BDEF1(b) => w.bone(b),
                VertexWeight::BDEF2 {
                    bone_index_1,
                    bone_index_2,
                    bone_weight_1,
                } => {
                    w.bone(bone_index_1);
                    w.bone(bone_index_2);
                    w.f32(bone_weight_1);
                }
                VertexWeight::BDEF4 {
                    bone_indices,
                    bone_weights,
                }
                | VertexWeight::QDEF {
                    bone_indices,
                    bone_weights,
                } => {
                    for b in bone_indices.iter() {
                        w.bone(*b);
                    }
                    w.vec(&bone_weights);
                }
                VertexWeight::SDEF {
                    bone_index_1,
                    bone_index_2,
                    bone_weight_1,
                    sdef_c,
                    sdef_r0,
                    sdef_r1,
                } => {
                    w.bone(bone_index_1);
                    w.bone(bone_index_2);
                    w.f32(bone_weight_1);
                    w.vec(&sdef_c);
                    w.vec(&sdef_r0);
                    w.vec(&sdef_r1);
                }
            }
            w.f32(v.edge_mag);
        }

        w.count(self.indices.len());
        for i in &self.indices {
            w.vertex_index(*i);
        }

        w.count(self.textures.len());
        for t in &self.textures {
            w.text(t);
        }

        w.count(self.materials.len());
        for m in &self.materials {
            w.text(&m.name);
            w.text(&m.english_name);
            w.vec(&m.diffuse);
            w.vec(&m.specular);
            w.f32(m.specular_factor);
            w.vec(&m.ambient);
            w.u8(m.draw_mode.bits());
            w.vec(&m.edge_color);
            w.f32(m.edge_size);
            w.index(m.texture_index, 4);
            match m.sphere_mode {
                None => {
                    w.index(None, 4);
                    w.u8(0);
                }
                Some(sphere) => {
                    w.index(sphere.index, 4);
                    w.u8(match sphere.kind {
                        SphereModeKind::Mul => 1,
                        SphereModeKind::Add => 2,
                        SphereModeKind::SubTexture => 3,
                    });
                }
            }
            match m.toon_mode {
                ToonMode::Separate(t) => {
                    w.u8(0);
                    w.index(t, 4);
                }
                ToonMode::Common(n) => {
                    w.u8(1);
                    w.u8(n);
                }
            }
            w.text(&m.memo);
            w.count(m.num_face_vertices);
        }

        w.count(self.bones.len());
        for b in &self.bones {
            w.text(&b.name);
            w.text(&b.english_name);
            w.vec(&b.position);
            w.bone(b.parent);
            w.i32(b.deform_depth);
            w.out.extend_from_slice(&b.flags.bits().to_le_bytes());
            if b.flags.contains(BoneFlags::CONNECT_TO_OTHER_BONE) {
                match b.connection_display_mode {
                    ConnectionDisplayMode::OtherBone(i) => w.bone(i),
                    ConnectionDisplayMode::Offset(_) => w.bone(None),
                }
            } else {
                match b.connection_display_mode {
                    ConnectionDisplayMode::Offset(v) => w.vec(&v),
                    ConnectionDisplayMode::OtherBone(_) => w.vec(&[0.0; 3]),
                }
            }
            if b
                .flags
                .intersects(BoneFlags::INHERIT_ROTATION | BoneFlags::INHERIT_TRANSLATION)
            {
                let append = b.append.unwrap_or(AppendParent {
                    parent: None,
                    rate: 0.0,
                });
                w.bone(append.parent);
                w.f32(append.rate);
            }
            if b.flags.contains(BoneFlags::FIXED_AXIS) {
                w.vec(&b.fixed_axis.unwrap_or_default());
            }
            if b.flags.contains(BoneFlags::LOCAL_COORDINATE) {
                let (x, z) = b.local_axis.unwrap_or_default();
                w.vec(&x);
                w.vec(&z);
            }
            if b.flags.contains(BoneFlags::EXTERNAL_PARENT_DEFORM) {
                w.i32(b.external_parent.unwrap_or(0));
            }
            if b.flags.contains(BoneFlags::IK) {
                let ik = b.ik_info.as_ref().unwrap();
                w.bone(Some(ik.ik_target_bone_index));
                w.i32(ik.ik_iter_count);
                w.f32(ik.ik_limit_angle);
                w.count(ik.ik_links.len());
                for link in &ik.ik_links {
                    w.bone(Some(link.ik_bone_index));
                    match link.angle_limit {
                        None => w.u8(0),
                        Some((lower, upper)) => {
                            w.u8(1);
                            w.vec(&lower);
                            w.vec(&upper);
                        }
                    }
                }
            }
        }

        w.count(self.morphs.len());
        for m in &self.morphs {
            w.text(&m.name);
            w.text(&m.english_name);
            w.u8(m.control_panel as u8);
            w.morph_data(&m.morph_data);
        }

        w.count(self.frames.len());
        for f in &self.frames {
            w.text(&f.name);
            w.text(&f.name_en);
            w.u8(f.is_special);
            w.count(f.inners.len());
            for inner in &f.inners {
                match inner.target {
                    Target::Bone => {
                        w.u8(0);
                        w.bone(Some(inner.index));
                    }
                    Target::Morph => {
                        w.u8(1);
                        w.index(Some(inner.index), 4);
                    }
                }
            }
        }

        w.count(self.rigid_bodies.len());
        for r in &self.rigid_bodies {
            w.text(&r.name);
            w.text(&r.name_en);
            w.bone(r.bone_index);
            w.u8(r.group);
            w.out
                .extend_from_slice(&r.un_collision_group_flag.to_le_bytes());
            w.u8(r.form as u8);
            w.vec(&r.size);
            w.vec(&r.position);
            w.vec(&r.rotation);
            w.f32(r.mass);
            w.f32(r.move_resist);
            w.f32(r.rotation_resist);
            w.f32(r.repulsion);
            w.f32(r.friction);
            w.u8(r.calc_method as u8);
        }

        w.count(self.joints.len());
        for j in &self.joints {
            w.text(&j.name);
            w.text(&j.name_en);
            w.u8(j.kind as u8);
            w.index(Some(j.a_rigid_index), 4);
            w.index(Some(j.b_rigid_index), 4);
            for v in [
                j.position,
                j.rotation,
                j.move_limit_down,
                j.move_limit_up,
                j.rotation_limit_down,
                j.rotation_limit_up,
                j.spring_const_move,
                j.spring_const_rotation,
            ]
            .iter()
            {
                w.vec(v);
            }
        }
        w.out
    }
}

struct Writer<'a> {
    out: Vec<u8>,
    builder: &'a PmxBuilder,
}

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }
    fn i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn f32(&mut self, v: f32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn count(&mut self, n: usize) {
        self.i32(n as i32);
    }
    fn vec(&mut self, v: &[f32]) {
        for e in v {
            self.f32(*e);
        }
    }
    fn text(&mut self, s: &str) {
        let bytes = self.builder.text_bytes(s);
        self.count(bytes.len());
        self.out.extend_from_slice(&bytes);
    }
    fn index(&mut self, v: Option<usize>, size: u8) {
        let v = v.map_or(-1, |v| v as i64);
        match size {
            1 => self.out.push(v as i8 as u8),
            2 => self.out.extend_from_slice(&(v as i16).to_le_bytes()),
            _ => self.out.extend_from_slice(&(v as i32).to_le_bytes()),
        }
    }
    fn bone(&mut self, v: Option<usize>) {
        self.index(v, self.builder.bone_index_size);
    }
    fn vertex_index(&mut self, v: usize) {
        match self.builder.vertex_index_size {
            1 => self.out.push(v as u8),
            2 => self.out.extend_from_slice(&(v as u16).to_le_bytes()),
            _ => self.out.extend_from_slice(&(v as i32).to_le_bytes()),
        }
    }
    fn uv_morphs(&mut self, tag: u8, offsets: &[UVMorph]) {
        self.u8(tag);
        self.count(offsets.len());
        for o in offsets {
            self.vertex_index(o.index);
            self.vec(&o.offset);
        }
    }
    fn morph_data(&mut self, data: &MorphKinds) {
        match data {
            MorphKinds::Group(v) => {
                self.u8(0);
                self.count(v.len());
                for o in v {
                    self.index(Some(o.index), 4);
                    self.f32(o.morph_factor);
                }
            }
            MorphKinds::Vertex(v) => {
                self.u8(1);
                self.count(v.len());
                for o in v {
                    self.vertex_index(o.index);
                    self.vec(&o.offset);
                }
            }
            MorphKinds::Bone(v) => {
                self.u8(2);
                self.count(v.len());
                for o in v {
                    self.bone(Some(o.index));
                    self.vec(&o.translates);
                    self.vec(&o.rotates);
                }
            }
            MorphKinds::UV(v) => self.uv_morphs(3, v),
            MorphKinds::UV1(v) => self.uv_morphs(4, v),
            MorphKinds::UV2(v) => self.uv_morphs(5, v),
            MorphKinds::UV3(v) => self.uv_morphs(6, v),
            MorphKinds::UV4(v) => self.uv_morphs(7, v),
            MorphKinds::Material(v) => {
                self.u8(8);
                self.count(v.len());
                for o in v {
                    self.index(o.index, 4);
                    self.u8(match o.formula {
                        MaterialMorphMethod::Mul => 0,
                        MaterialMorphMethod::Add => 1,
                    });
                    self.vec(&o.diffuse);
                    self.vec(&o.specular);
                    self.f32(o.specular_factor);
                    self.vec(&o.ambient);
                    self.vec(&o.edge_color);
                    self.f32(o.edge_size);
                    self.vec(&o.texture_factor);
                    self.vec(&o.sphere_texture_factor);
                    self.vec(&o.toon_texture_factor);
                }
            }
            MorphKinds::Flip(v) => {
                self.u8(9);
                self.count(v.len());
                for o in v {
                    self.index(Some(o.index), 4);
                    self.f32(o.morph_factor);
                }
            }
            MorphKinds::Impulse(v) => {
                self.u8(10);
                self.count(v.len());
                for o in v {
                    self.index(Some(o.rigid_index), 4);
                    self.u8(o.is_local);
                    self.vec(&o.velocity);
                    self.vec(&o.torque);
                }
            }
        }
    }
}
